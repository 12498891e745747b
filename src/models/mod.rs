pub mod booking;
pub mod laborer;
pub mod user;

pub use booking::{Booking, BookingForm, BookingId, BookingInput, BookingResponse, BookingStatus, Time};
pub use laborer::{Availability, AvailabilityStatus, LaborerInput, LaborerProfile, Service};
pub use user::{Principal, UserProfile, UserRole, ANONYMOUS_PRINCIPAL};
