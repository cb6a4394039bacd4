pub mod init;
pub mod meetings;

pub use init::{migrate, open_db};
pub use meetings::{MeetingRecord, MeetingStore, NewMeeting, StoreError};
