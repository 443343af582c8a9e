//! Status marks shared by the progress reporters.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✔ ", "[OK] ");
pub static CROSS: Emoji<'_, '_> = Emoji("✖ ", "[ERR] ");
pub static SKIPPED: Emoji<'_, '_> = Emoji("↓ ", "[SKIP] ");
pub static PENDING: Emoji<'_, '_> = Emoji("◌ ", "[ ] ");
pub static POINTER: Emoji<'_, '_> = Emoji("→ ", "-> ");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "* ");
