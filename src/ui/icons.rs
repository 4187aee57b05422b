//! Shared UI icons.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static FILE_NEW: Emoji<'_, '_> = Emoji("📄 ", "+");
pub static MONEY: Emoji<'_, '_> = Emoji("💰 ", "$");
