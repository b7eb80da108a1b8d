// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A generic, thread-safe fan-out event queue.

use std::sync::Mutex;

/// Delivers every published event to every live subscriber.
///
/// The bus is generic over the event type so that `lumen-core` stays decoupled
/// from the events defined in higher-level crates. Publishing with no
/// subscribers is valid and does nothing.
#[derive(Debug)]
pub struct EventBus<T: Clone + Send + 'static> {
    subscribers: Mutex<Vec<flume::Sender<T>>>,
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a new subscriber.
    ///
    /// ## Returns
    /// An unbounded receiver that sees every event published from now on.
    pub fn subscribe(&self) -> flume::Receiver<T> {
        let (sender, receiver) = flume::unbounded();
        self.subscribers.lock().unwrap().push(sender);
        receiver
    }

    /// Sends `event` to every subscriber, dropping those whose receiver is gone.
    ///
    /// ## Arguments
    /// * `event` - The event to deliver.
    pub fn publish(&self, event: T) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        log::trace!("Event delivered to {} subscriber(s).", subscribers.len());
    }

    /// The number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|sender| !sender.is_disconnected());
        subscribers.len()
    }
}

impl<T: Clone + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flume::TryRecvError;
    use std::sync::Arc;
    use std::{thread, time::Duration};

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Resized { width: u32, height: u32 },
        Shutdown,
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::<TestEvent>::new();
        bus.publish(TestEvent::Shutdown);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn every_subscriber_sees_every_event_in_order() {
        let bus = EventBus::<TestEvent>::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        let first = TestEvent::Resized {
            width: 1,
            height: 2,
        };
        bus.publish(first.clone());
        bus.publish(TestEvent::Shutdown);

        for rx in [&a, &b] {
            assert_eq!(rx.try_recv(), Ok(first.clone()));
            assert_eq!(rx.try_recv(), Ok(TestEvent::Shutdown));
            assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = EventBus::<TestEvent>::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(TestEvent::Shutdown);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv(), Ok(TestEvent::Shutdown));
    }

    #[test]
    fn publish_from_thread() {
        let bus = Arc::new(EventBus::<TestEvent>::new());
        let rx = bus.subscribe();

        let publisher = Arc::clone(&bus);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            publisher.publish(TestEvent::Shutdown);
        });

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)),
            Ok(TestEvent::Shutdown)
        );
        handle.join().expect("Thread join failed");
    }
}
