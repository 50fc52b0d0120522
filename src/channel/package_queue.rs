use tokio::sync::mpsc;

/// Bounded FIFO of parsed packages between the parser driver and the
/// consumer. End-of-stream is signaled by the producer side going away:
/// once `next` returns `None`, no further packages can be observed.
#[derive(Debug)]
pub struct PackageQueue;

impl PackageQueue {
    pub fn bounded<P>(capacity: usize) -> (PackageProducer<P>, PackageConsumer<P>) {
        let (tx, rx) = mpsc::channel(capacity);
        (PackageProducer { tx }, PackageConsumer { rx })
    }
}

#[derive(Debug)]
pub struct PackageProducer<P> {
    tx: mpsc::Sender<P>,
}

impl<P> PackageProducer<P> {
    /// Enqueue one package, suspending while the queue is full. Returns
    /// false once the consumer is gone.
    pub async fn push(&self, pkg: P) -> bool {
        self.tx.send(pkg).await.is_ok()
    }
}

#[derive(Debug)]
pub struct PackageConsumer<P> {
    rx: mpsc::Receiver<P>,
}

impl<P> PackageConsumer<P> {
    pub async fn next(&mut self) -> Option<P> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order_and_end_of_stream() {
        let (producer, mut consumer) = PackageQueue::bounded(4);
        assert!(producer.push(1).await);
        assert!(producer.push(2).await);
        drop(producer);

        assert_eq!(consumer.next().await, Some(1));
        assert_eq!(consumer.next().await, Some(2));
        assert_eq!(consumer.next().await, None);
        assert_eq!(consumer.next().await, None);
    }

    #[tokio::test]
    async fn test_push_fails_after_consumer_dropped() {
        let (producer, consumer) = PackageQueue::bounded::<u32>(4);
        drop(consumer);
        assert!(!producer.push(7).await);
    }
}
