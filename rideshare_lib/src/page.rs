use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const RIDES_PER_PAGE: i64 = 25;
pub const DRIVER_RIDES_PER_PAGE: i64 = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("invalid page {0:?}")]
    Invalid(String),
    #[error("page {requested} is out of range, there are {num_pages} pages")]
    OutOfRange { requested: i64, num_pages: i64 },
}

/// Which page of a listing was asked for. Pages count from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSelector {
    Number(i64),
    Last,
}

impl Default for PageSelector {
    fn default() -> Self {
        PageSelector::Number(1)
    }
}

impl FromStr for PageSelector {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "last" {
            return Ok(PageSelector::Last);
        }

        match s.parse::<i64>() {
            Ok(number) if number >= 1 => Ok(PageSelector::Number(number)),
            _ => Err(PageError::Invalid(s.to_string())),
        }
    }
}

/// The slice of a listing a page covers, ready for LIMIT/OFFSET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub num_pages: i64,
    pub limit: i64,
    pub offset: i64,
}

impl PageSelector {
    pub fn resolve(self, total: i64, per_page: i64) -> Result<PageWindow, PageError> {
        let num_pages = num_pages(total, per_page);
        let number = match self {
            PageSelector::Number(number) if number < 1 => return Err(PageError::Invalid(number.to_string())),
            PageSelector::Number(number) => number,
            PageSelector::Last => num_pages,
        };

        if number > num_pages {
            return Err(PageError::OutOfRange { requested: number, num_pages });
        }

        Ok(PageWindow {
            number,
            num_pages,
            limit: per_page,
            offset: (number - 1) * per_page,
        })
    }
}

/// An empty listing still has one (empty) page.
pub fn num_pages(total: i64, per_page: i64) -> i64 {
    if total <= 0 {
        1
    } else {
        (total + per_page - 1) / per_page
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub num_pages: i64,
    pub total: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total: i64) -> Self {
        Self {
            items,
            page: window.number,
            num_pages: window.num_pages,
            total,
            has_next: window.number < window.num_pages,
            has_previous: window.number > 1,
        }
    }
}
