use crate::models::{Booking, BookingStatus, Principal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(BookingStatus),
}

impl StatusFilter {
    fn matches(&self, booking: &Booking) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => booking.status == *status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Newest,
    Oldest,
}

/// Filters by status and orders by scheduled time. Stable: bookings with the
/// same time keep their input order.
pub fn filter_and_sort(bookings: &[Booking], filter: StatusFilter, order: SortOrder) -> Vec<Booking> {
    let mut selected: Vec<Booking> = bookings
        .iter()
        .filter(|b| filter.matches(b))
        .cloned()
        .collect();

    match order {
        SortOrder::Newest => selected.sort_by(|a, b| b.date_time.cmp(&a.date_time)),
        SortOrder::Oldest => selected.sort_by(|a, b| a.date_time.cmp(&b.date_time)),
    }
    selected
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingsOverview {
    pub incoming: Vec<Booking>,
    pub outgoing: Vec<Booking>,
}

pub fn partition(bookings: &[Booking], caller: &Principal) -> BookingsOverview {
    BookingsOverview {
        incoming: bookings
            .iter()
            .filter(|b| &b.target_laborer == caller)
            .cloned()
            .collect(),
        outgoing: bookings
            .iter()
            .filter(|b| &b.requester == caller)
            .cloned()
            .collect(),
    }
}
