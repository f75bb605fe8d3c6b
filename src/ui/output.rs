//! Status lines

use super::context::UiContext;
use console::style;

/// Success line with a dimmed detail
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        println!("{} {} ({})", style("✓").green(), message, style(detail).dim());
    } else {
        println!("{} {} ({})", style("[OK]").green(), message, detail);
    }
}

/// Warning line
pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        println!("{} {}", style("!").yellow(), message);
    } else {
        println!("{} {}", style("[WARN]").yellow(), message);
    }
}

/// Warning line followed by a hint
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    step_warn(ctx, message);
    println!("  {}", style(hint).dim());
}

/// Aligned `key: value` line
pub fn key_value(_ctx: &UiContext, key: &str, value: &str) {
    println!("  {:<12} {}", style(format!("{}:", key)).bold(), value);
}
