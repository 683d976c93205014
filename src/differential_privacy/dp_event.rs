use itertools::Itertools;
use std::fmt;

/// An object inspired by Google's [DPEvent](https://github.com/google/differential-privacy/blob/main/python/dp_accounting/dp_event.py)
/// to account for the releases of a private query
#[derive(Clone, Debug, PartialEq)]
pub enum DpEvent {
    /// Represents application of an operation with no privacy impact.
    ///
    /// A private query without any noised column, or a column of sensitivity 0, is a `NoOp`.
    NoOp,
    /// Represents an application of the Gaussian mechanism.
    ///
    /// For a value v and noise z ~ N(0, s^2), this mechanism returns v + z.
    /// If the value has sensitivity C, the noise_multiplier is defined as s / C.
    Gaussian { noise_multiplier: f64 },
    /// Represents an application of the Laplace mechanism.
    ///
    /// For a value v and noise z sampled from the Laplace distribution L(0, s),
    /// this mechanism returns v + z.
    /// If the value has sensitivity C, the noise_multiplier is defined as s / C.
    Laplace { noise_multiplier: f64 },
    /// Represents the application of a mechanism which is epsilon-delta approximate DP
    EpsilonDelta { epsilon: f64, delta: f64 },
    /// Represents application of a series of composed mechanisms.
    Composed { events: Vec<DpEvent> },
}

impl DpEvent {
    pub fn no_op() -> Self {
        Self::NoOp
    }

    pub fn gaussian(noise_multiplier: f64) -> Self {
        Self::Gaussian { noise_multiplier }
    }

    pub fn laplace(noise_multiplier: f64) -> Self {
        Self::Laplace { noise_multiplier }
    }

    pub fn epsilon_delta(epsilon: f64, delta: f64) -> Self {
        Self::EpsilonDelta { epsilon, delta }
    }

    pub fn compose(self, other: Self) -> Self {
        if other.is_no_op() {
            self
        } else if self.is_no_op() {
            other
        } else {
            let (v1, v2) = match (self, other) {
                (DpEvent::Composed { events: v1 }, DpEvent::Composed { events: v2 }) => (v1, v2),
                (DpEvent::Composed { events: v }, other) => (v, vec![other]),
                (current, DpEvent::Composed { events: v }) => (vec![current], v),
                (current, other) => (vec![current], vec![other]),
            };
            DpEvent::Composed {
                events: v1.into_iter().chain(v2).collect(),
            }
        }
    }

    pub fn is_no_op(&self) -> bool {
        match self {
            DpEvent::NoOp => true,
            DpEvent::Gaussian { noise_multiplier } | DpEvent::Laplace { noise_multiplier } => {
                noise_multiplier == &0.0
            }
            DpEvent::EpsilonDelta { epsilon, delta } => epsilon == &0. && delta == &0.,
            DpEvent::Composed { events } => events.iter().all(|q| q.is_no_op()),
        }
    }

    /// The number of elementary events
    pub fn len(&self) -> usize {
        match self {
            DpEvent::Composed { events } => events.iter().map(DpEvent::len).sum(),
            event if event.is_no_op() => 0,
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for DpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DpEvent::NoOp => write!(f, "NoOp"),
            DpEvent::Gaussian { noise_multiplier } => write!(f, "Gaussian ({noise_multiplier})"),
            DpEvent::Laplace { noise_multiplier } => write!(f, "Laplace ({noise_multiplier})"),
            DpEvent::EpsilonDelta { epsilon, delta } => write!(f, "EpsilonDelta ({epsilon}, {delta})"),
            DpEvent::Composed { events } => write!(
                f,
                "Composed ({})",
                events.iter().map(|dpe| format!("{}", dpe)).join(", ")
            ),
        }
    }
}

impl FromIterator<DpEvent> for DpEvent {
    fn from_iter<T: IntoIterator<Item = DpEvent>>(iter: T) -> Self {
        iter.into_iter()
            .fold(DpEvent::NoOp, |composed, event| composed.compose(event))
    }
}

impl From<Vec<DpEvent>> for DpEvent {
    fn from(v: Vec<DpEvent>) -> Self {
        v.into_iter().collect()
    }
}
