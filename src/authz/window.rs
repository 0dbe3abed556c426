use chrono::NaiveDate;

/// Inclusive calendar-day validity bounds; `None` leaves that side open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidityWindow {
    pub begin: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ValidityWindow {
    pub fn new(begin: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { begin, end }
    }

    /// Begin after end. Such a window is never open.
    pub fn is_inverted(&self) -> bool {
        matches!((self.begin, self.end), (Some(b), Some(e)) if b > e)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        if self.is_inverted() {
            return false;
        }
        let after_begin = self.begin.map_or(true, |b| day >= b);
        let before_end = self.end.map_or(true, |e| day <= e);
        after_begin && before_end
    }
}
