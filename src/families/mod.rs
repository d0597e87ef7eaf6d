// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! CPU family support. The only family is MOS 6502 and its descendants.

pub mod mos6502;
