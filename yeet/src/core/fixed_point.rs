//! Bounded fixed-point iteration.
//!
//! Both the include resolver and the self-templating pass repeat a step until
//! it stops producing changes. The iteration cap is injected so the loop can
//! be exercised without any I/O.

/// Maximum number of steps a convergence loop may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationPolicy {
    pub max_iterations: u32,
}

impl Default for IterationPolicy {
    fn default() -> Self {
        Self { max_iterations: 10 }
    }
}

/// What a single step reports back to the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// The step changed the state; keep going.
    Changed(T),
    /// The step produced no change; the state is a fixed point.
    Settled(T),
}

/// Final state of a convergence loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iterated<T> {
    pub value: T,
    /// Number of steps that ran.
    pub iterations: u32,
    /// False when the cap was hit before a step settled.
    pub converged: bool,
}

/// Run `step` until it settles or the policy's cap is reached.
///
/// Hitting the cap is not an error: the last state is returned with
/// `converged == false`.
pub fn iterate<T, E>(
    policy: IterationPolicy,
    initial: T,
    mut step: impl FnMut(T) -> Result<Step<T>, E>,
) -> Result<Iterated<T>, E> {
    let mut value = initial;
    for iteration in 1..=policy.max_iterations {
        match step(value)? {
            Step::Settled(settled) => {
                return Ok(Iterated {
                    value: settled,
                    iterations: iteration,
                    converged: true,
                });
            }
            Step::Changed(next) => value = next,
        }
    }
    Ok(Iterated {
        value,
        iterations: policy.max_iterations,
        converged: false,
    })
}
