//! Remote object storage
//!
//! The upload gateway boundary, a Supabase-flavored client, and the
//! recent-capture polling feed.

pub mod feed;
pub mod gateway;
pub mod supabase;

pub use feed::RecentCaptureFeed;
pub use gateway::{CapturedArtifact, StoredObject, UploadGateway, SELFIE_BUCKET, VIDEO_BUCKET};
pub use supabase::SupabaseStorage;
