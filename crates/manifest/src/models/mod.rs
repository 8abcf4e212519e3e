mod author;
mod comment;
mod manifest;
mod media;
mod post;

pub use self::author::Author;
pub use self::comment::Comment;
pub use self::manifest::Manifest;
pub use self::media::{MediaItem, MediaKind};
pub use self::post::Post;
