// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Pending-day calculation

use crate::time::LocalDay;

/// Civil days strictly after `last_processed` and strictly before `today`.
///
/// `today` is never included because its data is still incomplete. Every day
/// is derived from `last_processed` by a whole number of calendar days and then
/// re-anchored at local midnight, so DST transitions neither skip nor repeat a
/// day. Returns an empty list when `last_processed` is yesterday or later.
pub fn pending_days(last_processed: &LocalDay, today: &LocalDay) -> Vec<LocalDay> {
    let count = last_processed.days_until(today) - 1;
    if count <= 0 {
        return Vec::new();
    }

    (1..=count).map(|n| last_processed.offset(n)).collect()
}
