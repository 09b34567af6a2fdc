//! Revenue statistics over business days

pub mod business_day;
pub mod calculator;

pub use business_day::{BusinessDateRange, BusinessDayCalendar};
pub use calculator::{OperatorScope, RevenueCalculator, RevenueInputs, StatsQuery};
