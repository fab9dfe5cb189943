//! Cut off candidates that are not reachable from any root. This is
//! an escape check: side effects on objects no root can reach are
//! invisible to callers.

use super::BoundingCx;

pub fn run(cx: &mut BoundingCx) {
    let roots = cx.graph.roots().to_vec();
    let reachable = cx.find_reachable(roots);
    for c in cx.interface() {
        if !reachable.contains(c) {
            log::trace!("cut_unreachable: removing {}", c);
            cx.remove(c);
        }
    }
}
