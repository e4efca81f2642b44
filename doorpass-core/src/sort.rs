//! Column sorting for the active and invalid pass tables.

use crate::pass::Pass;
use crate::DoorPassError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => f.write_str("asc"),
            Self::Descending => f.write_str("desc"),
        }
    }
}

/// A sortable column.
pub trait SortField: Copy + Eq {
    /// Direction used when the field is first selected.
    fn default_direction(self) -> SortDirection;

    /// Ascending comparison of two passes on this field.
    fn compare(self, a: &Pass, b: &Pass) -> Ordering;
}

fn compare_names(a: &Pass, b: &Pass) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

fn compare_types(a: &Pass, b: &Pass) -> Ordering {
    a.pass_type.as_str().cmp(b.pass_type.as_str())
}

/// Columns of the active table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveSortField {
    Id,
    Name,
    Type,
    ExpiryTime,
}

impl SortField for ActiveSortField {
    fn default_direction(self) -> SortDirection {
        match self {
            Self::ExpiryTime => SortDirection::Descending,
            _ => SortDirection::Ascending,
        }
    }

    fn compare(self, a: &Pass, b: &Pass) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::Name => compare_names(a, b),
            Self::Type => compare_types(a, b),
            Self::ExpiryTime => a.expiry_time.cmp(&b.expiry_time),
        }
    }
}

impl FromStr for ActiveSortField {
    type Err = DoorPassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "type" => Ok(Self::Type),
            "expiry" | "expiry_time" | "expirytime" => Ok(Self::ExpiryTime),
            other => Err(DoorPassError::InvalidInput(format!(
                "unknown active sort field: {}",
                other
            ))),
        }
    }
}

/// Columns of the invalid table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidSortField {
    Id,
    Name,
    Type,
    Status,
    /// Deletion time, or expiry time for expired passes.
    StatusTime,
}

impl SortField for InvalidSortField {
    fn default_direction(self) -> SortDirection {
        match self {
            Self::StatusTime => SortDirection::Descending,
            _ => SortDirection::Ascending,
        }
    }

    fn compare(self, a: &Pass, b: &Pass) -> Ordering {
        match self {
            Self::Id => a.id.cmp(&b.id),
            Self::Name => compare_names(a, b),
            Self::Type => compare_types(a, b),
            Self::Status => a.invalid_status().cmp(&b.invalid_status()),
            Self::StatusTime => a.status_time().cmp(&b.status_time()),
        }
    }
}

impl FromStr for InvalidSortField {
    type Err = DoorPassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "name" => Ok(Self::Name),
            "type" => Ok(Self::Type),
            "status" => Ok(Self::Status),
            "status_time" | "statustime" | "time" => Ok(Self::StatusTime),
            other => Err(DoorPassError::InvalidInput(format!(
                "unknown invalid sort field: {}",
                other
            ))),
        }
    }
}

/// Current sort column and direction of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState<F> {
    pub field: F,
    pub direction: SortDirection,
}

impl<F: SortField> SortState<F> {
    pub fn new(field: F) -> Self {
        Self {
            field,
            direction: field.default_direction(),
        }
    }

    /// Select `field`: flips the direction if already selected, otherwise
    /// switches to it with its default direction.
    pub fn toggle(&mut self, field: F) {
        if self.field == field {
            self.direction = self.direction.toggled();
        } else {
            *self = Self::new(field);
        }
    }

    /// Stable sort; ties keep their input order.
    pub fn sort(&self, passes: &mut [Pass]) {
        let (field, direction) = (self.field, self.direction);
        passes.sort_by(|a, b| direction.apply(field.compare(a, b)));
    }

    pub fn sorted(&self, passes: &[Pass]) -> Vec<Pass> {
        let mut sorted = passes.to_vec();
        self.sort(&mut sorted);
        sorted
    }
}

impl Default for SortState<ActiveSortField> {
    fn default() -> Self {
        Self::new(ActiveSortField::Name)
    }
}

impl Default for SortState<InvalidSortField> {
    fn default() -> Self {
        Self::new(InvalidSortField::StatusTime)
    }
}
