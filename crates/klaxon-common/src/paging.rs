//! Pagination and ordering of alert query results. Sorting happens on the
//! full filtered result set, then [`Pager::slice`] cuts one page out of it;
//! the page always reports the total size of the unsliced set.

use crate::types::Alert;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

/// Sortable alert fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    AlertId,
    Ctime,
    Severity,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: OrderField,
    pub direction: Direction,
}

impl Order {
    pub fn ascending(field: OrderField) -> Self {
        Self {
            field,
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field: OrderField) -> Self {
        Self {
            field,
            direction: Direction::Descending,
        }
    }
}

/// Zero-based page request. An empty `orders` list means the default order,
/// alert id ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    pub page: usize,
    pub page_size: usize,
    pub orders: Vec<Order>,
}

impl Pager {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            orders: Vec::new(),
        }
    }

    /// Builder-style append of one ordering. Earlier orders take precedence.
    pub fn order_by(mut self, field: OrderField, direction: Direction) -> Self {
        self.orders.push(Order { field, direction });
        self
    }

    /// Index of the first item of the requested page.
    pub fn start(&self) -> usize {
        self.page * self.page_size
    }

    pub fn effective_orders(&self) -> Vec<Order> {
        if self.orders.is_empty() {
            vec![Order::ascending(OrderField::AlertId)]
        } else {
            self.orders.clone()
        }
    }

    /// Cuts this pager's page out of the full sorted result set. A page
    /// starting past the end is empty but still reports the true total.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total_size = items.len();
        let start = self.start().min(total_size);
        let end = (start + self.page_size).min(total_size);
        let window = items.into_iter().skip(start).take(end - start).collect();
        Page {
            items: window,
            pager: self.clone(),
            total_size,
        }
    }
}

/// One page of results plus the pager that produced it and the total size of
/// the unpaged result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pager: Pager,
    pub total_size: usize,
}

impl<T> Page<T> {
    /// Wraps an already complete result set as its own single page.
    pub fn single(items: Vec<T>) -> Self {
        let total_size = items.len();
        Self {
            pager: Pager::new(0, total_size),
            items,
            total_size,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> std::ops::Deref for Page<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Compares two alerts under a list of orderings, most significant first.
/// Ties after every ordering fall back to alert id ascending so that the
/// overall order is total and pages never overlap.
pub fn compare_alerts(a: &Alert, b: &Alert, orders: &[Order]) -> Ordering {
    for order in orders {
        let ord = match order.field {
            OrderField::AlertId => a.alert_id.cmp(&b.alert_id),
            OrderField::Ctime => a.ctime.cmp(&b.ctime),
            OrderField::Severity => a.severity.cmp(&b.severity),
            OrderField::Status => a.status.cmp(&b.status),
        };
        let ord = match order.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.alert_id.cmp(&b.alert_id)
}
