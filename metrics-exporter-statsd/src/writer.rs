use bytes::{BufMut as _, BytesMut};

/// The shortest line a collector would accept: a one-character name, a one-digit value, and a type suffix.
pub(crate) const SMALLEST_VALID_PACKET: &[u8] = b"a:0|c";

/// The largest payload that fits in a single UDP datagram over IPv4.
pub(crate) const LARGEST_VALID_PACKET_LEN: usize = 65_507;

/// Result of appending a metric to a [`PacketBuffer`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Append {
    /// The metric was appended to the current packet.
    Appended,

    /// The metric does not fit in the current packet, which must be sent (and cleared) first.
    Full,

    /// The metric is larger than the maximum packet size on its own, and can never be sent.
    Oversized,
}

/// Accumulates rendered metrics into newline-delimited packets.
///
/// StatsD metrics are newline delimited, which means that multiple metrics can be sent in a single datagram and then
/// trivially split apart by the collector. A maximum packet size must be specified: the buffer never grows beyond it,
/// counting the newline separators between metrics.
pub(crate) struct PacketBuffer {
    max_packet_len: usize,
    buf: BytesMut,
}

impl PacketBuffer {
    /// Creates a new `PacketBuffer` with the given maximum packet length.
    pub fn new(max_packet_len: usize) -> Self {
        // NOTE: This is also validated in the builder, but we want to double check that we're getting a properly
        // sanitized value.
        assert!(
            max_packet_len >= SMALLEST_VALID_PACKET.len(),
            "maximum packet length is too small to allow any metrics to be written (must be {} or greater)",
            SMALLEST_VALID_PACKET.len()
        );

        Self { max_packet_len, buf: BytesMut::with_capacity(max_packet_len) }
    }

    /// Returns the number of bytes in the current packet.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if the current packet holds no metrics.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the current packet.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Discards the current packet.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Tries to append `metric` to the current packet.
    ///
    /// A separator is written first if the packet already holds a metric. Nothing is written unless the result is
    /// [`Append::Appended`].
    pub fn try_append(&mut self, metric: &[u8]) -> Append {
        if metric.len() > self.max_packet_len {
            return Append::Oversized;
        }

        let separator_len = usize::from(!self.buf.is_empty());
        if self.buf.len() + separator_len + metric.len() > self.max_packet_len {
            return Append::Full;
        }

        if separator_len != 0 {
            self.buf.put_u8(b'\n');
        }
        self.buf.extend_from_slice(metric);

        Append::Appended
    }
}

#[cfg(test)]
mod tests {
    use proptest::{collection::vec as arb_vec, prelude::*, proptest};

    use super::{Append, PacketBuffer, SMALLEST_VALID_PACKET};

    #[test]
    fn joins_with_newlines() {
        let mut buffer = PacketBuffer::new(64);
        assert!(buffer.is_empty());

        assert_eq!(buffer.try_append(b"a:1|c"), Append::Appended);
        assert_eq!(buffer.try_append(b"b:2|g"), Append::Appended);
        assert_eq!(buffer.as_bytes(), b"a:1|c\nb:2|g");
        assert_eq!(buffer.len(), 11);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.try_append(b"c:3|ms"), Append::Appended);
        assert_eq!(buffer.as_bytes(), b"c:3|ms");
    }

    #[test]
    fn separator_counts_towards_limit() {
        // Two five byte metrics and a separator need eleven bytes.
        let mut buffer = PacketBuffer::new(10);
        assert_eq!(buffer.try_append(b"a:1|c"), Append::Appended);
        assert_eq!(buffer.try_append(b"b:2|c"), Append::Full);
        assert_eq!(buffer.as_bytes(), b"a:1|c");

        let mut buffer = PacketBuffer::new(11);
        assert_eq!(buffer.try_append(b"a:1|c"), Append::Appended);
        assert_eq!(buffer.try_append(b"b:2|c"), Append::Appended);
        assert_eq!(buffer.len(), 11);
    }

    #[test]
    fn oversized_metric_is_rejected_even_when_empty() {
        let mut buffer = PacketBuffer::new(8);
        assert_eq!(buffer.try_append(b"too_long:1|c"), Append::Oversized);
        assert!(buffer.is_empty());

        // Exactly at the limit is fine.
        assert_eq!(buffer.try_append(b"ab:123|c"), Append::Appended);
    }

    #[test]
    #[should_panic(expected = "maximum packet length is too small")]
    fn rejects_tiny_limit() {
        let _ = PacketBuffer::new(SMALLEST_VALID_PACKET.len() - 1);
    }

    proptest! {
        #[test]
        fn property_packets_never_exceed_limit(
            limit in SMALLEST_VALID_PACKET.len()..512usize,
            metrics in arb_vec("[a-z]{1,16}:[0-9]{1,8}\\|(c|g|ms|a|t)", 1..128),
        ) {
            let mut buffer = PacketBuffer::new(limit);
            let mut packets: Vec<Vec<u8>> = Vec::new();
            let mut accepted = Vec::new();

            for metric in &metrics {
                match buffer.try_append(metric.as_bytes()) {
                    Append::Appended => accepted.push(metric.clone()),
                    Append::Full => {
                        packets.push(buffer.as_bytes().to_vec());
                        buffer.clear();
                        prop_assert_eq!(buffer.try_append(metric.as_bytes()), Append::Appended);
                        accepted.push(metric.clone());
                    }
                    Append::Oversized => prop_assert!(metric.len() > limit),
                }
                prop_assert!(buffer.len() <= limit);
            }
            if !buffer.is_empty() {
                packets.push(buffer.as_bytes().to_vec());
            }

            // Splitting every packet back apart yields exactly the accepted metrics, in order.
            let mut split = Vec::new();
            for packet in &packets {
                prop_assert!(packet.len() <= limit);
                let packet = std::str::from_utf8(packet).expect("packets are ASCII");
                split.extend(packet.split('\n').map(str::to_owned));
            }
            prop_assert_eq!(split, accepted);
        }
    }
}
