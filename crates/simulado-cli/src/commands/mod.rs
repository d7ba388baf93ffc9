pub mod init;
pub mod interactive;
pub mod resume;
pub mod review;
pub mod run;
