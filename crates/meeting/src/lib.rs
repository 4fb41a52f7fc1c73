mod clock;
mod controller;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::MeetingController;
