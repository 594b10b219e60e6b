//! Effective H.264 profile from source bit depth and color-depth policy.

use super::types::{ColorDepthPolicy, H264Profile};
use crate::engine::probe::MediaInfo;

/// Why the requested profile was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustReason {
    /// Compatibility policy forced an 8-bit profile
    ForcedCompatibility,
    /// Auto policy saw a 10-bit source
    TenBitSource,
    /// Quality policy preserved a 10-bit source
    PreserveTenBit,
}

/// Result of profile selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileChoice {
    pub profile: H264Profile,
    pub adjusted: bool,
    pub reason: Option<AdjustReason>,
}

impl ProfileChoice {
    fn keep(profile: H264Profile) -> Self {
        Self {
            profile,
            adjusted: false,
            reason: None,
        }
    }

    fn adjust(profile: H264Profile, reason: AdjustReason) -> Self {
        Self {
            profile,
            adjusted: true,
            reason: Some(reason),
        }
    }

    /// Log line describing the adjustment, if any
    pub fn describe(&self, requested: H264Profile, media: &MediaInfo) -> Option<String> {
        let reason = self.reason?;
        Some(match reason {
            AdjustReason::ForcedCompatibility => format!(
                "Compatibility mode: profile {} replaced by 8-bit profile {}",
                requested, self.profile
            ),
            AdjustReason::TenBitSource | AdjustReason::PreserveTenBit => format!(
                "10-bit source detected ({}, {} bit): profile {} upgraded to {}",
                if media.pix_fmt.is_empty() { "unknown pixel format" } else { &media.pix_fmt },
                media.effective_bit_depth(),
                requested,
                self.profile
            ),
        })
    }
}

/// Pick the profile to encode with.
///
/// Feeding the returned profile back in as `requested` always returns it
/// unchanged.
pub fn select_profile(
    media: &MediaInfo,
    requested: H264Profile,
    policy: ColorDepthPolicy,
) -> ProfileChoice {
    match policy {
        ColorDepthPolicy::Compatibility => {
            if requested.is_eight_bit() {
                ProfileChoice::keep(requested)
            } else {
                ProfileChoice::adjust(H264Profile::High, AdjustReason::ForcedCompatibility)
            }
        }
        ColorDepthPolicy::Quality => {
            if media.is_ten_bit() && requested.is_eight_bit() {
                ProfileChoice::adjust(H264Profile::High10, AdjustReason::PreserveTenBit)
            } else {
                ProfileChoice::keep(requested)
            }
        }
        ColorDepthPolicy::Auto => {
            if media.is_ten_bit() && requested.is_eight_bit() {
                ProfileChoice::adjust(H264Profile::High10, AdjustReason::TenBitSource)
            } else {
                ProfileChoice::keep(requested)
            }
        }
    }
}
