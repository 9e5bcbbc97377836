use std::collections::VecDeque;

use crate::math::rng::SimRng;

use super::params::Parameters;

/// The ten event kinds. The nine transitions move one individual between
/// compartments; `Contact` targets an (age, risk) pair whose vaccination
/// status is resolved when the event is processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    EtoA,
    AtoT,
    AtoR,
    AtoD,
    TtoI,
    TtoR,
    TtoD,
    ItoR,
    ItoD,
    Contact { to_age: usize, to_risk: usize },
}

#[derive(Clone, Debug)]
pub struct Event {
    pub init_time: f64,
    pub time: f64,
    pub kind: EventKind,
    pub from: [usize; 3],
}

/// Disease state of the individual a schedule belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleState {
    Exposed,
    Asymptomatic,
    Treatable,
    Infectious,
    Recovered,
    Deceased,
}

/// One exposed individual's timeline of future events.
///
/// Transition events are drawn once at exposure by competing-risks
/// sampling; contact events are inserted afterwards by the driver. The
/// event list is kept sorted by time, so the front is always the next
/// event.
pub struct Schedule {
    stratification: [usize; 3],
    state: ScheduleState,
    cancelled: bool,
    events: VecDeque<Event>,
    infected_t_min: f64,
    infected_t_max: f64,
    pub(super) seq: u64,
}

impl Schedule {
    /// Draw the state-transition timeline for an individual exposed at
    /// `t0`. At each branching point the candidate waiting times are drawn
    /// in a fixed order (progression, recovery, death) and the minimum
    /// decides the path; the sequence terminates at recovered or deceased.
    pub fn draw(t0: f64, stratification: [usize; 3], params: &Parameters, rng: &mut SimRng) -> Self {
        let mut events = VecDeque::new();

        let t_asymptomatic = t0 + rng.exponential(params.tau);
        events.push_back(Event {
            init_time: t0,
            time: t_asymptomatic,
            kind: EventKind::EtoA,
            from: stratification,
        });

        let mut t = t_asymptomatic;

        // asymptomatic: progress to treatable, recover, or die
        let (dwell, kind) = competing_risks(
            rng,
            &[
                (params.kappa, EventKind::AtoT),
                (params.gamma, EventKind::AtoR),
                (params.nu, EventKind::AtoD),
            ],
        );
        let from_a = t;
        t += dwell;
        events.push_back(Event {
            init_time: from_a,
            time: t,
            kind,
            from: stratification,
        });

        if kind == EventKind::AtoT {
            // treatable: become infectious, recover, or die
            let (dwell, kind) = competing_risks(
                rng,
                &[
                    (params.chi, EventKind::TtoI),
                    (params.gamma, EventKind::TtoR),
                    (params.nu, EventKind::TtoD),
                ],
            );
            let from_t = t;
            t += dwell;
            events.push_back(Event {
                init_time: from_t,
                time: t,
                kind,
                from: stratification,
            });

            if kind == EventKind::TtoI {
                // infectious: recover or die
                let (dwell, kind) = competing_risks(
                    rng,
                    &[(params.gamma, EventKind::ItoR), (params.nu, EventKind::ItoD)],
                );
                let from_i = t;
                t += dwell;
                events.push_back(Event {
                    init_time: from_i,
                    time: t,
                    kind,
                    from: stratification,
                });
            }
        }

        Self {
            stratification,
            state: ScheduleState::Exposed,
            cancelled: false,
            events,
            infected_t_min: t_asymptomatic,
            infected_t_max: t,
            seq: 0,
        }
    }

    /// Insert an event keeping the list sorted by time; equal times keep
    /// insertion order.
    pub fn insert_event(&mut self, event: Event) {
        let pos = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(pos, event);
    }

    /// Pop the next event and advance the state tag it implies.
    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop_front()?;
        self.state = match event.kind {
            EventKind::EtoA => ScheduleState::Asymptomatic,
            EventKind::AtoT => ScheduleState::Treatable,
            EventKind::AtoR | EventKind::TtoR | EventKind::ItoR => ScheduleState::Recovered,
            EventKind::AtoD | EventKind::TtoD | EventKind::ItoD => ScheduleState::Deceased,
            EventKind::TtoI => ScheduleState::Infectious,
            EventKind::Contact { .. } => self.state,
        };
        Some(event)
    }

    pub fn next_event_time(&self) -> Option<f64> {
        self.events.front().map(|e| e.time)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    pub fn stratification(&self) -> [usize; 3] {
        self.stratification
    }

    /// Move the individual to a different stratum. Pending events move
    /// with it: their compartment transitions must act on the stratum the
    /// individual is actually in.
    pub fn restratify(&mut self, stratification: [usize; 3]) {
        self.stratification = stratification;
        for event in &mut self.events {
            event.from = stratification;
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Start of the infectious window (asymptomatic onset).
    pub fn infected_t_min(&self) -> f64 {
        self.infected_t_min
    }

    /// End of the infectious window (recovery or death).
    pub fn infected_t_max(&self) -> f64 {
        self.infected_t_max
    }

    #[cfg(test)]
    fn with_single_event(time: f64) -> Self {
        let mut schedule = Self {
            stratification: [0, 0, 0],
            state: ScheduleState::Exposed,
            cancelled: false,
            events: VecDeque::new(),
            infected_t_min: time,
            infected_t_max: time,
            seq: 0,
        };
        schedule.insert_event(Event {
            init_time: 0.0,
            time,
            kind: EventKind::EtoA,
            from: [0, 0, 0],
        });
        schedule
    }
}

fn competing_risks(rng: &mut SimRng, candidates: &[(f64, EventKind)]) -> (f64, EventKind) {
    let mut winner = (f64::INFINITY, candidates[0].1);
    for &(rate, kind) in candidates {
        let dwell = rng.exponential(rate);
        if dwell < winner.0 {
            winner = (dwell, kind);
        }
    }
    winner
}

/// Per-node priority queue of schedules, keyed by each schedule's next
/// event time with insertion order as tie-break.
///
/// A plain vector-backed binary heap. Intervention rewrites walk the
/// backing vector mutably (`iter_mut`): cancelling a schedule or changing
/// its stratification never touches event times, so the heap order stays
/// intact.
#[derive(Default)]
pub struct ScheduleQueue {
    heap: Vec<Schedule>,
    next_seq: u64,
}

impl ScheduleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Next event time across all schedules in the queue.
    pub fn next_event_time(&self) -> Option<f64> {
        self.heap.first().and_then(|s| s.next_event_time())
    }

    pub fn push(&mut self, mut schedule: Schedule) {
        schedule.seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(schedule);
        self.sift_up(self.heap.len() - 1);
    }

    pub fn pop(&mut self) -> Option<Schedule> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let schedule = self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        schedule
    }

    /// Mutable walk over every schedule, in storage order. Callers may
    /// cancel or restratify entries but must not touch event times.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Schedule> {
        self.heap.iter_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Schedule> {
        self.heap.iter()
    }

    fn less(&self, a: usize, b: usize) -> bool {
        let ka = self.heap[a].next_event_time().unwrap_or(f64::INFINITY);
        let kb = self.heap[b].next_event_time().unwrap_or(f64::INFINITY);
        match ka.total_cmp(&kb) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => self.heap[a].seq < self.heap[b].seq,
        }
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.less(i, parent) {
                self.heap.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut smallest = i;
            if left < self.heap.len() && self.less(left, smallest) {
                smallest = left;
            }
            if right < self.heap.len() && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.heap.swap(i, smallest);
            i = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_pops_in_time_order() {
        let mut queue = ScheduleQueue::new();
        for &t in &[3.5, 1.25, 2.0, 0.5, 2.0] {
            queue.push(Schedule::with_single_event(t));
        }

        let mut times = Vec::new();
        while let Some(s) = queue.pop() {
            times.push(s.next_event_time().unwrap());
        }
        assert_eq!(times, vec![0.5, 1.25, 2.0, 2.0, 3.5]);
    }

    #[test]
    fn equal_times_pop_in_insertion_order() {
        let mut queue = ScheduleQueue::new();
        for _ in 0..4 {
            queue.push(Schedule::with_single_event(1.0));
        }
        let mut seqs = Vec::new();
        while let Some(s) = queue.pop() {
            seqs.push(s.seq);
        }
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn cancelling_mid_queue_keeps_order() {
        let mut queue = ScheduleQueue::new();
        for &t in &[2.0, 1.0, 3.0] {
            queue.push(Schedule::with_single_event(t));
        }
        for schedule in queue.iter_mut() {
            if schedule.next_event_time() == Some(2.0) {
                schedule.cancel();
            }
        }
        let first = queue.pop().unwrap();
        assert_eq!(first.next_event_time(), Some(1.0));
        assert!(!first.is_cancelled());
        let second = queue.pop().unwrap();
        assert!(second.is_cancelled());
    }

    #[test]
    fn drawn_schedule_terminates() {
        let params = Parameters::default();
        let mut rng = SimRng::seed_from(11);
        for _ in 0..50 {
            let schedule = Schedule::draw(0.0, [2, 0, 0], &params, &mut rng);
            assert_eq!(schedule.state(), ScheduleState::Exposed);
            assert!(schedule.infected_t_min() > 0.0);
            assert!(schedule.infected_t_max() >= schedule.infected_t_min());
            assert!(schedule.infected_t_max().is_finite());
        }
    }

    #[test]
    fn death_only_when_no_recovery() {
        let params = Parameters {
            gamma: 0.0,
            nu: 0.5,
            ..Parameters::default()
        };
        let mut rng = SimRng::seed_from(5);
        for _ in 0..50 {
            let mut schedule = Schedule::draw(0.0, [1, 1, 0], &params, &mut rng);
            while schedule.pop_next().is_some() {}
            assert_eq!(schedule.state(), ScheduleState::Deceased);
        }
    }

    #[test]
    fn restratify_rewrites_pending_events() {
        let params = Parameters::default();
        let mut rng = SimRng::seed_from(2);
        let mut schedule = Schedule::draw(0.0, [1, 0, 0], &params, &mut rng);
        schedule.restratify([1, 0, 1]);
        while let Some(event) = schedule.pop_next() {
            assert_eq!(event.from, [1, 0, 1]);
        }
    }
}
