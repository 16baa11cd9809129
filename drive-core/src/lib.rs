mod client;
mod oauth;

pub use client::{
    ApiErrorClass, DriveClient, DriveError, EntryKind, FileList, RemoteEntry, FOLDER_MIME_TYPE,
};
pub use oauth::{OAuthClient, OAuthError, OAuthToken};
