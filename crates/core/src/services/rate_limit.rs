use chrono::NaiveDate;

/// Calls allowed against a metered provider per local calendar day.
///
/// The counter resets lazily: the first check on a new date starts from zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyBudget {
    limit: u32,
    used: u32,
    day: NaiveDate,
}

impl DailyBudget {
    pub fn new(limit: u32, today: NaiveDate) -> Self {
        Self {
            limit,
            used: 0,
            day: today,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn roll(&mut self, today: NaiveDate) {
        if today != self.day {
            self.day = today;
            self.used = 0;
        }
    }

    /// Reserve `cost` calls. Returns false, leaving the counter untouched,
    /// when the reservation would exceed the limit.
    pub fn try_consume(&mut self, cost: u32, today: NaiveDate) -> bool {
        self.roll(today);
        match self.used.checked_add(cost) {
            Some(total) if total <= self.limit => {
                self.used = total;
                true
            }
            _ => false,
        }
    }

    pub fn used(&mut self, today: NaiveDate) -> u32 {
        self.roll(today);
        self.used
    }

    pub fn remaining(&mut self, today: NaiveDate) -> u32 {
        self.roll(today);
        self.limit.saturating_sub(self.used)
    }
}
