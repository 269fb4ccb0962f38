//! Alert filters for handlers.

use std::{borrow::Cow, fmt, sync::Arc};

use crate::{
    ws::{Alert, Severity},
    AlertHandler,
};

/// Type implements this trait can check if an alert is wanted.
pub trait AlertFilter {
    /// true if alert is wanted, otherwise false.
    fn matches(&self, alert: &Alert) -> bool;
}

impl<F> AlertFilter for F
where
    F: Fn(&Alert) -> bool,
{
    fn matches(&self, alert: &Alert) -> bool {
        self(alert)
    }
}

/// Negative wrapper of a filter.
#[derive(Debug, Copy, Clone)]
pub struct Not<F> {
    filter: F,
}

impl<F> AlertFilter for Not<F>
where
    F: AlertFilter,
{
    fn matches(&self, alert: &Alert) -> bool {
        !self.filter.matches(alert)
    }
}

/// If and only if a and b both pass, this filter will pass.
#[derive(Debug, Copy, Clone)]
pub struct And<FA, FB> {
    a: FA,
    b: FB,
}

impl<FA, FB> AlertFilter for And<FA, FB>
where
    FA: AlertFilter,
    FB: AlertFilter,
{
    fn matches(&self, alert: &Alert) -> bool {
        self.a.matches(alert) && self.b.matches(alert)
    }
}

/// If a or b pass, this filter will pass.
#[derive(Debug, Copy, Clone)]
pub struct Or<FA, FB> {
    a: FA,
    b: FB,
}

impl<FA, FB> AlertFilter for Or<FA, FB>
where
    FA: AlertFilter,
    FB: AlertFilter,
{
    fn matches(&self, alert: &Alert) -> bool {
        self.a.matches(alert) || self.b.matches(alert)
    }
}

/// Filter combinator.
pub trait AlertFilterExt
where
    Self: Sized,
{
    /// Invert a filter.
    fn not(self) -> Not<Self> {
        Not { filter: self }
    }

    /// Return a new filter that passes an alert only if self and other both pass it.
    fn and<F>(self, other: F) -> And<Self, F> {
        And { a: self, b: other }
    }

    /// Return a new filter that passes an alert if self or other passes it.
    fn or<F>(self, other: F) -> Or<Self, F> {
        Or { a: self, b: other }
    }
}

impl<T> AlertFilterExt for T where T: AlertFilter {}

/// Filter that will pass all alerts.
#[derive(Debug, Copy, Clone)]
pub struct All;

impl AlertFilter for All {
    fn matches(&self, _alert: &Alert) -> bool {
        true
    }
}

/// Create a filter that passes all alerts.
pub fn all() -> All {
    All
}

/// Filter that will reject all alerts.
#[derive(Debug, Copy, Clone)]
pub struct None;

impl AlertFilter for None {
    fn matches(&self, _alert: &Alert) -> bool {
        false
    }
}

/// Create a filter that will reject all alerts.
pub fn none() -> None {
    None
}

/// Filter that passes alerts at or above a minimum severity.
#[derive(Debug, Copy, Clone)]
pub struct SeverityAtLeast {
    min: Severity,
}

impl AlertFilter for SeverityAtLeast {
    fn matches(&self, alert: &Alert) -> bool {
        alert.severity >= self.min
    }
}

/// Create a filter that passes alerts at or above the given severity.
pub fn severity_at_least(min: Severity) -> SeverityAtLeast {
    SeverityAtLeast { min }
}

/// Filter that passes alerts belonging to one patient.
#[derive(Debug, Clone)]
pub struct ForPatient {
    patient_id: String,
}

impl AlertFilter for ForPatient {
    fn matches(&self, alert: &Alert) -> bool {
        alert.patient_id == self.patient_id
    }
}

/// Create a filter that passes alerts belonging to the given patient.
pub fn for_patient<S: Into<String>>(patient_id: S) -> ForPatient {
    ForPatient {
        patient_id: patient_id.into(),
    }
}

/// Handler adapter that forwards only matching alerts to an inner handler.
pub struct Filtered<F, H> {
    filter: F,
    inner: Arc<H>,
}

impl<F, H> Filtered<F, H> {
    /// Wrap a handler so it only sees alerts passing the filter.
    pub fn new(filter: F, handler: H) -> Self {
        Self {
            filter,
            inner: Arc::new(handler),
        }
    }
}

impl<F, H> fmt::Debug for Filtered<F, H>
where
    F: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filtered")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<F, H> AlertHandler for Filtered<F, H>
where
    F: AlertFilter + Send + Sync,
    H: AlertHandler + 'static,
{
    fn name(&self) -> Cow<'static, str> {
        format!("Filtered({})", self.inner.name()).into()
    }

    async fn on_alert(self: Arc<Self>, alert: Alert) {
        if self.filter.matches(&alert) {
            self.inner.clone().on_alert(alert).await
        }
    }
}
