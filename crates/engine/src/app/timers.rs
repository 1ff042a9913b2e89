/// Deferred one-shot and repeating callbacks, expressed as events.
///
/// Handles pair a slot index with a generation. Releasing a slot bumps its
/// generation, so a handle kept past cancellation or firing can never touch
/// the timer that later reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    slot: u32,
    generation: u32,
}

const MIN_REPEAT_INTERVAL_SECONDS: f32 = 1.0 / 240.0;

#[derive(Debug, Clone)]
struct TimerEntry<E> {
    event: E,
    remaining_seconds: f32,
    repeat_interval_seconds: Option<f32>,
}

#[derive(Debug, Clone)]
struct TimerSlot<E> {
    generation: u32,
    entry: Option<TimerEntry<E>>,
}

#[derive(Debug, Clone)]
pub struct TimerQueue<E> {
    slots: Vec<TimerSlot<E>>,
    free_slots: Vec<u32>,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
        }
    }
}

impl<E: Clone> TimerQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_once(&mut self, delay_seconds: f32, event: E) -> TimerHandle {
        self.insert(TimerEntry {
            event,
            remaining_seconds: sanitize_seconds(delay_seconds),
            repeat_interval_seconds: None,
        })
    }

    pub fn schedule_repeating(&mut self, interval_seconds: f32, event: E) -> TimerHandle {
        let interval = sanitize_seconds(interval_seconds).max(MIN_REPEAT_INTERVAL_SECONDS);
        self.insert(TimerEntry {
            event,
            remaining_seconds: interval,
            repeat_interval_seconds: Some(interval),
        })
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.slot as usize) else {
            return false;
        };
        if slot.generation != handle.generation || slot.entry.is_none() {
            return false;
        }
        self.release(handle.slot);
        true
    }

    /// Cancels whatever the optional handle points at and clears it.
    pub fn cancel_slot(&mut self, handle: &mut Option<TimerHandle>) -> bool {
        match handle.take() {
            Some(handle) => self.cancel(handle),
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0usize;
        for index in 0..self.slots.len() {
            if self.slots[index].entry.is_some() {
                self.release(index as u32);
                cancelled += 1;
            }
        }
        cancelled
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.slots
            .get(handle.slot as usize)
            .is_some_and(|slot| slot.generation == handle.generation && slot.entry.is_some())
    }

    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    /// Advances every timer and returns the events that fired, in slot order.
    /// A repeating timer fires at most once per tick.
    pub fn tick(&mut self, dt_seconds: f32) -> Vec<E> {
        let dt_seconds = sanitize_seconds(dt_seconds);
        let mut fired = Vec::new();
        let mut finished = Vec::new();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(entry) = slot.entry.as_mut() else {
                continue;
            };
            entry.remaining_seconds -= dt_seconds;
            if entry.remaining_seconds > 0.0 {
                continue;
            }
            fired.push(entry.event.clone());
            match entry.repeat_interval_seconds {
                Some(interval) => {
                    entry.remaining_seconds += interval;
                    if entry.remaining_seconds <= 0.0 {
                        entry.remaining_seconds = interval;
                    }
                }
                None => finished.push(index as u32),
            }
        }

        for index in finished {
            self.release(index);
        }
        fired
    }

    fn insert(&mut self, entry: TimerEntry<E>) -> TimerHandle {
        if let Some(slot_index) = self.free_slots.pop() {
            let slot = &mut self.slots[slot_index as usize];
            slot.entry = Some(entry);
            return TimerHandle {
                slot: slot_index,
                generation: slot.generation,
            };
        }

        let slot_index = self.slots.len() as u32;
        self.slots.push(TimerSlot {
            generation: 0,
            entry: Some(entry),
        });
        TimerHandle {
            slot: slot_index,
            generation: 0,
        }
    }

    fn release(&mut self, slot_index: u32) {
        let slot = &mut self.slots[slot_index as usize];
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(slot_index);
    }
}

fn sanitize_seconds(seconds: f32) -> f32 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}
