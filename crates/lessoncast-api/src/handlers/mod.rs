pub mod health;
pub mod lesson_video;
pub mod media;
