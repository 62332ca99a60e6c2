/// Picks one of two values based on a condition, without the ceremony of a full `if` block at
/// the call site. Handy for byte-order-dependent value selection.
#[macro_export]
macro_rules! choose {
    ($cond: expr => $true_val: expr, $false_val: expr) => {{
        if $cond {
            $true_val
        } else {
            $false_val
        }
    }};
}
