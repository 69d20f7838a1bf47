pub mod event;
pub mod ticket;

pub use event::{Event, EventStatus, NewEvent};
pub use ticket::{CheckInStatus, NewTicket, Ticket};
