// Channel assignment - which output channel each collected track plays on

use crate::midi::event::PERCUSSION_CHANNEL;
use crate::track::entry::TrackType;

/// Percussion tracks share one channel; melodic tracks count up from
/// `first_melodic`, stepping over the percussion channel. When channel 16
/// is used up the count starts again at `first_melodic`. Channels outside
/// 1-16 are clamped into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPolicy {
    pub first_melodic: u8,
    pub percussion: u8,
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        Self {
            first_melodic: 2,
            percussion: PERCUSSION_CHANNEL,
        }
    }
}

impl ChannelPolicy {
    pub fn new(first_melodic: u8, percussion: u8) -> Self {
        Self {
            first_melodic: first_melodic.clamp(1, 16),
            percussion: percussion.clamp(1, 16),
        }
    }

    fn first(&self) -> u8 {
        self.first_melodic.clamp(1, 16)
    }

    fn percussion_channel(&self) -> u8 {
        self.percussion.clamp(1, 16)
    }

    /// One channel per track type, in input order
    pub fn assign(&self, types: &[TrackType]) -> Vec<u8> {
        let percussion = self.percussion_channel();
        let mut next = self.first();
        types
            .iter()
            .map(|track_type| match track_type {
                TrackType::Percussion => percussion,
                TrackType::Melodic => {
                    if next == percussion {
                        next = self.step(next);
                    }
                    let channel = next;
                    next = self.step(next);
                    channel
                }
            })
            .collect()
    }

    /// Next melodic channel after `channel`; the percussion channel only
    /// when no other is left
    fn step(&self, channel: u8) -> u8 {
        let mut next = channel;
        for _ in 0..16 {
            next = if next >= 16 { self.first() } else { next + 1 };
            if next != self.percussion_channel() {
                return next;
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TrackType::{Melodic, Percussion};

    #[test]
    fn test_mixed_tracks() {
        let policy = ChannelPolicy::default();
        let channels = policy.assign(&[Percussion, Melodic, Melodic, Percussion, Melodic]);
        assert_eq!(channels, vec![10, 2, 3, 10, 4]);
    }

    #[test]
    fn test_melodic_skips_percussion_channel() {
        let policy = ChannelPolicy::default();
        let channels = policy.assign(&[Melodic; 10]);
        assert_eq!(channels, vec![2, 3, 4, 5, 6, 7, 8, 9, 11, 12]);
    }

    #[test]
    fn test_wraps_after_sixteen() {
        let policy = ChannelPolicy::default();
        let channels = policy.assign(&[Melodic; 15]);
        assert_eq!(channels[13], 16);
        assert_eq!(channels[14], 2);
    }

    #[test]
    fn test_percussion_never_takes_a_melodic_slot() {
        let policy = ChannelPolicy::default();
        let channels = policy.assign(&[Percussion, Percussion, Percussion, Melodic]);
        assert_eq!(channels, vec![10, 10, 10, 2]);
    }

    #[test]
    fn test_first_melodic_equal_to_percussion_is_skipped() {
        let policy = ChannelPolicy::new(10, 10);
        assert_eq!(policy.assign(&[Melodic]), vec![11]);
    }

    #[test]
    fn test_last_channel_for_both_terminates() {
        let policy = ChannelPolicy::new(16, 16);
        assert_eq!(policy.assign(&[Melodic, Percussion, Melodic]), vec![16, 16, 16]);
    }

    #[test]
    fn test_out_of_range_channels_are_clamped() {
        let policy = ChannelPolicy::new(20, 10);
        let channels = policy.assign(&[Melodic; 4]);
        assert_eq!(channels, vec![16, 16, 16, 16]);

        let policy = ChannelPolicy {
            first_melodic: 0,
            percussion: 10,
        };
        let channels = policy.assign(&[Melodic, Melodic, Percussion]);
        assert_eq!(channels, vec![1, 2, 10]);
        assert!(channels.iter().all(|c| (1..=16).contains(c)));
    }
}
