//! Database entities.

#![allow(missing_docs)]

pub mod album;
pub mod album_like;
pub mod comment;
pub mod following;
pub mod message;
pub mod notification;
pub mod report;
pub mod saved_album;
pub mod user;

pub use album::Entity as Album;
pub use album_like::Entity as AlbumLike;
pub use comment::Entity as Comment;
pub use following::Entity as Following;
pub use message::Entity as Message;
pub use notification::Entity as Notification;
pub use report::Entity as Report;
pub use saved_album::Entity as SavedAlbum;
pub use user::Entity as User;
