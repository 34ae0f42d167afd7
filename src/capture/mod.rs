//! Media acquisition
//!
//! Device seams, stream/track ownership, and the nokhwa/cpal backends.
//! `MediaAcquisition` is the single owner of the acquired stream.

pub mod acquisition;
pub mod audio;
pub mod camera;
pub mod stream;
pub mod traits;

pub use acquisition::MediaAcquisition;
pub use audio::{enumerate_audio_inputs, CpalMicrophone};
pub use camera::{enumerate_cameras, NokhwaCamera};
pub use stream::{AudioTrack, StreamHandle, VideoTrack};
pub use traits::{
    AudioDeviceInfo, AudioInputDevice, AudioSource, CameraDevice, CameraFacing, CameraInfo,
    FrameSource, Resolution, StreamConstraints, VideoFrame,
};
