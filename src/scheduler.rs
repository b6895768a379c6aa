/// The callbacks driven by the step loop, in their fixed same-instant
/// order: forcing and rating-curve updates come before the allocation
/// solve, coupling exchanges after it, and output sampling last so it
/// sees the post-callback state. Discrete control is not scheduled
/// here; its zero crossings are located between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CallbackKind {
    Forcing = 0,
    RatingCurve = 1,
    Allocation = 2,
    Coupling = 3,
    Output = 4,
}

/// Pre-computed schedule of time callbacks. Periods and table
/// timestamps are known up front, so the whole schedule is one sorted
/// vector played with a cursor.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    events: Vec<(f64, CallbackKind)>,
    cursor: usize,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        forcing_times: &[f64],
        rating_times: &[f64],
        allocation_dt: Option<f64>,
        coupling_dt: Option<f64>,
        saveat: f64,
        t0: f64,
        t_end: f64,
    ) -> Self {
        let mut events: Vec<(f64, CallbackKind)> = Vec::new();
        for &t in forcing_times {
            if t > t0 && t <= t_end {
                events.push((t, CallbackKind::Forcing));
            }
        }
        for &t in rating_times {
            if t > t0 && t <= t_end {
                events.push((t, CallbackKind::RatingCurve));
            }
        }
        if let Some(dt) = allocation_dt {
            if dt > 0.0 {
                let mut t = t0;
                while t <= t_end {
                    events.push((t, CallbackKind::Allocation));
                    t += dt;
                }
            }
        }
        if let Some(dt) = coupling_dt {
            if dt > 0.0 {
                let mut t = t0 + dt;
                while t <= t_end {
                    events.push((t, CallbackKind::Coupling));
                    t += dt;
                }
            }
        }
        events.push((t0, CallbackKind::Output));
        if saveat > 0.0 {
            let mut t = t0 + saveat;
            while t < t_end {
                events.push((t, CallbackKind::Output));
                t += saveat;
            }
        }
        events.push((t_end, CallbackKind::Output));

        events.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(&b.1)));
        events.dedup_by(|a, b| (a.0 - b.0).abs() < 1e-9 && a.1 == b.1);
        Self { events, cursor: 0 }
    }

    /// Time of the next pending event, if any.
    pub fn next_time(&self) -> Option<f64> {
        self.events.get(self.cursor).map(|e| e.0)
    }

    /// Pop every event due at time t (within tolerance), already in
    /// same-instant callback order.
    pub fn pop_due(&mut self, t: f64) -> Vec<CallbackKind> {
        let mut due = Vec::new();
        while self.cursor < self.events.len() && self.events[self.cursor].0 <= t + 1e-9 {
            due.push(self.events[self.cursor].1);
            self.cursor += 1;
        }
        due
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.events.len()
    }
}
