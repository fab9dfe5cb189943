//! Driver: computes a bounded mod/ref interface for every procedure of
//! a program and hands the result to an `InterfaceSink`.

use crate::candidates::{Candidate, ModRefCandidates};
use crate::entity::EntitySet;
use crate::errors::Canceled;
use crate::monitor::{check_canceled, ProgressMonitor};
use crate::passes::{
    cut_immutables, cut_unreachable, merge_at_depth, merge_exceptions,
    merge_one_field_per_parent, merge_statics, BoundingCx, PassKind,
};
use crate::program::{CgNode, Procedure, Program, TypeId};
use crate::propagate::propagate;
use anyhow::{bail, Context};
use fxhash::FxHashMap;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct Options {
    pub cut_off_unreachable: bool,
    pub merge_exceptions: bool,
    pub cut_off_immutables: bool,
    /// Fully-qualified names of types whose instances never change.
    pub immutable_types: Vec<String>,
    pub merge_one_field_per_parent: bool,
    pub merge_pruned_call_nodes: bool,
    pub advanced_interproc_propagation: bool,
    /// `None` means unlimited.
    pub max_nodes_per_interface: Option<usize>,
    pub merge_depth: usize,
}

impl Default for Options {
    fn default() -> Options {
        let mut immutable_types: Vec<String> = cut_immutables::DEFAULT_IMMUTABLES
            .iter()
            .map(|name| name.to_string())
            .collect();
        immutable_types.sort();
        Options {
            cut_off_unreachable: true,
            merge_exceptions: true,
            cut_off_immutables: true,
            immutable_types,
            merge_one_field_per_parent: true,
            merge_pruned_call_nodes: true,
            advanced_interproc_propagation: true,
            max_nodes_per_interface: Some(30),
            merge_depth: merge_at_depth::STD_MERGE_LEVEL,
        }
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {:?}", other),
    }
}

impl Options {
    /// Defaults overridden by `OBJGRAPH_*` environment variables.
    pub fn from_env() -> anyhow::Result<Options> {
        Options::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> anyhow::Result<Options> {
        let mut opts = Options::default();

        let flags: [(&str, &mut bool); 6] = [
            ("OBJGRAPH_CUT_OFF_UNREACHABLE", &mut opts.cut_off_unreachable),
            ("OBJGRAPH_MERGE_EXCEPTIONS", &mut opts.merge_exceptions),
            ("OBJGRAPH_CUT_OFF_IMMUTABLE", &mut opts.cut_off_immutables),
            (
                "OBJGRAPH_MERGE_ONE_FIELD_PER_PARENT",
                &mut opts.merge_one_field_per_parent,
            ),
            (
                "OBJGRAPH_MERGE_PRUNED_CALL_NODES",
                &mut opts.merge_pruned_call_nodes,
            ),
            (
                "OBJGRAPH_ADVANCED_INTERPROC_PROP",
                &mut opts.advanced_interproc_propagation,
            ),
        ];
        for (key, flag) in flags {
            if let Some(value) = lookup(key) {
                *flag = parse_bool(&value).with_context(|| format!("invalid value for {}", key))?;
            }
        }

        if let Some(value) = lookup("OBJGRAPH_MAX_NODES_PER_INTERFACE") {
            let max: i64 = value.trim().parse().with_context(|| {
                format!(
                    "invalid value for OBJGRAPH_MAX_NODES_PER_INTERFACE: {:?}",
                    value
                )
            })?;
            opts.max_nodes_per_interface = if max < 0 { None } else { Some(max as usize) };
        }

        if let Some(value) = lookup("OBJGRAPH_MERGE_DEPTH") {
            opts.merge_depth = value
                .trim()
                .parse()
                .with_context(|| format!("invalid value for OBJGRAPH_MERGE_DEPTH: {:?}", value))?;
        }

        log::debug!("options: {:?}", opts);
        Ok(opts)
    }
}

/// Receives the final interface of each procedure.
pub trait InterfaceSink {
    fn register_interface(
        &mut self,
        procedure: &Procedure,
        interface: &[Candidate],
        cands: &ModRefCandidates,
    );
}

/// A sink that keeps every registered interface.
#[derive(Clone, Debug, Default)]
pub struct Interfaces {
    pub by_node: FxHashMap<CgNode, Vec<Candidate>>,
}

impl InterfaceSink for Interfaces {
    fn register_interface(
        &mut self,
        procedure: &Procedure,
        interface: &[Candidate],
        _cands: &ModRefCandidates,
    ) {
        self.by_node.insert(procedure.node, interface.to_vec());
    }
}

#[derive(Clone, Debug)]
pub struct ProcReport {
    pub node: CgNode,
    pub name: String,
    pub initial: usize,
    pub final_size: usize,
    /// Candidates removed by each pass that ran, in order.
    pub passes: Vec<(PassKind, usize)>,
}

impl ProcReport {
    /// Final size as a percentage of the initial one.
    pub fn percent(&self) -> f64 {
        if self.initial == 0 {
            100.0
        } else {
            self.final_size as f64 * 100.0 / self.initial as f64
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Stats {
    /// Interface candidates over all nodes right after propagation.
    pub candidates: usize,
    pub propagation_time: Duration,
    pub optimization_time: Duration,
    pub procs: Vec<ProcReport>,
}

impl Stats {
    fn log(&self) {
        log::info!(
            "objgraph: {} candidates, propagation {:?}, optimization {:?}",
            self.candidates,
            self.propagation_time,
            self.optimization_time
        );
        for report in &self.procs {
            log::info!(
                "objgraph: {} {}: {} -> {} ({:.1}%)",
                report.node,
                report.name,
                report.initial,
                report.final_size,
                report.percent()
            );
        }
    }
}

fn apply<F: FnOnce(&mut BoundingCx)>(
    cx: &mut BoundingCx,
    report: &mut ProcReport,
    kind: PassKind,
    pass: F,
) {
    let before = cx.size();
    pass(cx);
    let after = cx.size();
    log::debug!("{}: {} {} -> {}", kind, cx.procedure.name, before, after);
    report.passes.push((kind, before.saturating_sub(after)));
}

fn bound_interface(
    cx: &mut BoundingCx,
    options: &Options,
    immutables: &EntitySet<TypeId>,
    report: &mut ProcReport,
) {
    if options.cut_off_unreachable {
        apply(cx, report, PassKind::CutUnreachable, cut_unreachable::run);
    }
    if options.merge_exceptions {
        apply(cx, report, PassKind::MergeExceptions, merge_exceptions::run);
    }
    if options.cut_off_immutables {
        let cut_after = options.cut_off_unreachable;
        apply(cx, report, PassKind::CutImmutables, |cx| {
            cut_immutables::run(cx, immutables, cut_after)
        });
    }
    if options.merge_one_field_per_parent {
        apply(
            cx,
            report,
            PassKind::MergeOneFieldPerParent,
            merge_one_field_per_parent::run,
        );
    }
    if let Some(max) = options.max_nodes_per_interface {
        if cx.size() > max {
            apply(cx, report, PassKind::MergeStatics, merge_statics::run);
        }
        if cx.size() > max {
            let depth = options.merge_depth;
            apply(cx, report, PassKind::MergeAtDepth, |cx| {
                merge_at_depth::run(cx, max, depth)
            });
        }
    }
}

/// Runs propagation, the bounding pipeline, and pruned-call folding.
/// Interfaces are registered with `sink` only once everything else
/// has completed; on cancellation nothing is registered.
pub fn compute(
    program: &Program,
    options: &Options,
    monitor: &dyn ProgressMonitor,
    sink: &mut dyn InterfaceSink,
) -> Result<Stats, Canceled> {
    let mut stats = Stats::default();
    let start = Instant::now();

    let callgraph = program.callgraph.strip_thread_start_to_run();
    let mut cands = ModRefCandidates::compute_intraproc(program);
    let propagated = propagate(
        program,
        &callgraph,
        &cands,
        options.advanced_interproc_propagation,
        monitor,
    )?;
    for node in callgraph.nodes() {
        check_canceled(monitor)?;
        for c in propagated.get(node).iter() {
            cands.add_candidate(node, c);
        }
    }
    stats.candidates = cands.count_candidates();
    stats.propagation_time = start.elapsed();

    let start = Instant::now();
    let immutables = cut_immutables::resolve(
        program,
        options.immutable_types.iter().map(|name| name.as_str()),
    );
    for procedure in program.procedures() {
        check_canceled(monitor)?;
        let mut cx = BoundingCx::new(&mut cands, procedure);
        let mut report = ProcReport {
            node: procedure.node,
            name: procedure.name.clone(),
            initial: cx.size(),
            final_size: 0,
            passes: vec![],
        };
        bound_interface(&mut cx, options, &immutables, &mut report);
        report.final_size = cx.size();
        stats.procs.push(report);
    }

    if options.merge_pruned_call_nodes {
        for procedure in program.procedures() {
            for &succ in callgraph.succs(procedure.node) {
                if callgraph.is_pruned_member(succ) {
                    continue;
                }
                check_canceled(monitor)?;
                if let Some(m) = cands.fold_into(procedure.node, propagated.get(succ)) {
                    log::debug!(
                        "fold: {} folded into {} of {}",
                        succ,
                        m,
                        procedure.name
                    );
                }
            }
        }
        for report in &mut stats.procs {
            report.final_size = cands.interface(report.node).len();
        }
    }
    stats.optimization_time = start.elapsed();

    check_canceled(monitor)?;
    for procedure in program.procedures() {
        let interface: Vec<Candidate> = cands.interface(procedure.node).iter().collect();
        sink.register_interface(procedure, &interface, &cands);
    }

    stats.log();
    Ok(stats)
}

#[cfg(test)]
mod test {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn defaults() {
        let opts = Options::from_lookup(lookup(&[])).unwrap();
        assert!(opts.cut_off_unreachable);
        assert!(opts.advanced_interproc_propagation);
        assert_eq!(opts.max_nodes_per_interface, Some(30));
        assert_eq!(opts.merge_depth, 5);
        assert!(opts.immutable_types.iter().any(|t| t == "java.lang.String"));
    }

    #[test]
    fn overrides() {
        let _ = env_logger::try_init();
        let opts = Options::from_lookup(lookup(&[
            ("OBJGRAPH_MAX_NODES_PER_INTERFACE", "-1"),
            ("OBJGRAPH_MERGE_EXCEPTIONS", "false"),
            ("OBJGRAPH_MERGE_DEPTH", "3"),
        ]))
        .unwrap();
        assert_eq!(opts.max_nodes_per_interface, None);
        assert!(!opts.merge_exceptions);
        assert_eq!(opts.merge_depth, 3);
    }

    #[test]
    fn rejects_garbage() {
        let err = Options::from_lookup(lookup(&[("OBJGRAPH_MAX_NODES_PER_INTERFACE", "many")]))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("OBJGRAPH_MAX_NODES_PER_INTERFACE"));
        assert!(Options::from_lookup(lookup(&[("OBJGRAPH_CUT_OFF_IMMUTABLE", "maybe")])).is_err());
    }
}
