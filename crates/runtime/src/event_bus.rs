/// Ordered buffer of notifications raised by a component during one call.
///
/// Components push typed events while they mutate their state; the owner
/// drains them afterwards and forwards them to whatever consumes them (a
/// presentation layer, a status line, a log). Draining is explicit so events
/// are always observed on the owning thread.
#[derive(Debug)]
pub struct EventBus<E> {
    events: Vec<E>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: E) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[E] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Ping {
        A,
        B(u32),
    }

    #[test]
    fn keeps_emission_order() {
        let mut bus = EventBus::new();
        bus.emit(Ping::B(1));
        bus.emit(Ping::A);
        assert_eq!(bus.events(), &[Ping::B(1), Ping::A]);
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn drain_clears_events() {
        let mut bus = EventBus::new();
        bus.emit(Ping::A);
        let drained = bus.drain();
        assert_eq!(drained, vec![Ping::A]);
        assert!(bus.is_empty());
    }
}
