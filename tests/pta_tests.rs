// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::rc::Rc;

use cspta::context::{
    ContextId, ContextInsensitive, ContextSelector, KCallSiteSensitive, KObjectSensitive,
    KTypeSensitive,
};
use cspta::cs::{CSMethodId, CSObjId, CSVarId};
use cspta::graph::call_graph::CSCallEdge;
use cspta::graph::pag::Pointer;
use cspta::ir::hierarchy::DispatchResolver;
use cspta::ir::loader::load_program;
use cspta::ir::{CallKind, CallSiteId, MethodId, Program, TypeId, VarId};
use cspta::plugin::{NativeModeler, Plugin};
use cspta::pta::worklist::WorklistOrder;
use cspta::pta::{
    make_selector, run_pointer_analysis, PTAType, PointerAnalysisResult, PointsTo, Solver,
};
use cspta::pts_set::points_to::PointsToSet;
use cspta::util::options::AnalysisOptions;
use cspta::util::pta_statistics::PTAStat;
use cspta::util::results_dumper;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn load(name: &str) -> Program {
    init_logger();
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "programs", name]
        .iter()
        .collect();
    load_program(&path).unwrap()
}

fn analyze<'p>(
    program: &'p Program,
    selector: Box<dyn ContextSelector>,
    plugins: Vec<Box<dyn Plugin + 'p>>,
) -> PointerAnalysisResult<'p> {
    let mut solver = Solver::new(program, selector, WorklistOrder::Fifo);
    for plugin in plugins {
        solver.add_plugin(plugin);
    }
    solver.solve()
}

fn var(program: &Program, method: &str, name: &str) -> VarId {
    let method = program.method_by_name(method).unwrap();
    program.var_by_name(method, name).unwrap()
}

fn method(program: &Program, name: &str) -> MethodId {
    program.method_by_name(name).unwrap()
}

/// The `ordinal`-th call site of `container`.
fn call_site(program: &Program, container: &str, ordinal: usize) -> CallSiteId {
    let container = method(program, container);
    program
        .call_sites()
        .find(|(_, cs)| cs.container == container && cs.ordinal == ordinal)
        .map(|(id, _)| id)
        .unwrap()
}

/// Names of the types of the objects `var` points to.
fn pts_types(result: &PointerAnalysisResult, method: &str, name: &str) -> BTreeSet<String> {
    let program = result.program();
    result
        .points_to_set_of(var(program, method, name))
        .into_iter()
        .map(|obj| program.get_type(result.csm().get_obj(obj).ty).name.clone())
        .collect()
}

fn callee_names(result: &PointerAnalysisResult, callsite: CallSiteId) -> BTreeSet<String> {
    result
        .callees_of(callsite)
        .into_iter()
        .map(|m| result.program().method_name(m))
        .collect()
}

/// Everything a run computes with contexts projected away, keyed by names so
/// that runs can be compared.
#[derive(Debug, PartialEq)]
struct Snapshot {
    vars: BTreeMap<VarId, BTreeSet<String>>,
    /// Instance fields, array contents and static fields.
    heap: BTreeMap<String, BTreeSet<String>>,
    call_graph: BTreeSet<(String, String)>,
}

impl Snapshot {
    /// Every points-to set and call edge of `self` also appears in `other`.
    fn is_subsumed_by(&self, other: &Snapshot) -> bool {
        let within = |mine: &BTreeSet<String>, theirs: Option<&BTreeSet<String>>| {
            theirs.is_some_and(|theirs| mine.is_subset(theirs))
        };
        self.call_graph.is_subset(&other.call_graph)
            && self.vars.iter().all(|(v, objs)| within(objs, other.vars.get(v)))
            && self.heap.iter().all(|(p, objs)| within(objs, other.heap.get(p)))
    }
}

fn snapshot(result: &PointerAnalysisResult) -> Snapshot {
    let program = result.program();
    let obj_name = |cs_obj: CSObjId| result.obj_name(result.csm().cs_obj(cs_obj).obj);

    let mut vars = BTreeMap::new();
    for (_, m) in program.methods() {
        for v in &m.vars {
            let objs: BTreeSet<String> = result
                .points_to_set_of(*v)
                .into_iter()
                .map(|o| result.obj_name(o))
                .collect();
            if !objs.is_empty() {
                vars.insert(*v, objs);
            }
        }
    }

    let mut heap: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (pointer, pts) in result.pointers() {
        let key = match pointer {
            Pointer::Var(_) => continue,
            Pointer::StaticField(field) => program.field_name(field),
            Pointer::InstanceField(base, field) => {
                format!("{}.{}", obj_name(base), program.get_field(field).name)
            }
            Pointer::ArrayIndex(base) => format!("{}[*]", obj_name(base)),
        };
        heap.entry(key).or_default().extend(pts.iter().map(obj_name));
    }

    let call_graph = result
        .call_graph()
        .into_iter()
        .map(|(cs, callee)| (program.call_site_name(cs), program.method_name(callee)))
        .collect();
    Snapshot { vars, heap, call_graph }
}

#[derive(Default)]
struct Events {
    started: usize,
    finished: usize,
    new_methods: Vec<MethodId>,
    new_cs_methods: Vec<CSMethodId>,
    call_edges: Vec<CSCallEdge>,
    unresolved: Vec<(CSObjId, ContextId, CallSiteId)>,
    /// Size of the full points-to set of a variable at each of its events.
    pts_sizes: HashMap<CSVarId, Vec<usize>>,
    empty_deltas: usize,
}

/// Records every event it receives.
struct EventLog(Rc<RefCell<Events>>);

impl Plugin for EventLog {
    fn on_start(&mut self, _solver: &mut Solver<'_>) {
        self.0.borrow_mut().started += 1;
    }

    fn on_finish(&mut self, _solver: &Solver<'_>) {
        self.0.borrow_mut().finished += 1;
    }

    fn on_new_points_to_set(&mut self, solver: &mut Solver<'_>, cs_var: CSVarId, delta: &PointsTo<CSObjId>) {
        let size = solver.cs_var_points_to(cs_var).count();
        let mut events = self.0.borrow_mut();
        if delta.is_empty() {
            events.empty_deltas += 1;
        }
        events.pts_sizes.entry(cs_var).or_default().push(size);
    }

    fn on_new_call_edge(&mut self, _solver: &mut Solver<'_>, edge: &CSCallEdge) {
        self.0.borrow_mut().call_edges.push(*edge);
    }

    fn on_new_method(&mut self, _solver: &mut Solver<'_>, method: MethodId) {
        self.0.borrow_mut().new_methods.push(method);
    }

    fn on_new_cs_method(&mut self, _solver: &mut Solver<'_>, cs_method: CSMethodId) {
        self.0.borrow_mut().new_cs_methods.push(cs_method);
    }

    fn on_unresolved_call(
        &mut self,
        _solver: &mut Solver<'_>,
        recv: CSObjId,
        context: ContextId,
        callsite: CallSiteId,
    ) {
        self.0.borrow_mut().unresolved.push((recv, context, callsite));
    }
}

fn event_log() -> (Rc<RefCell<Events>>, Box<dyn Plugin>) {
    let events = Rc::new(RefCell::new(Events::default()));
    (events.clone(), Box::new(EventLog(events)))
}

#[test]
fn virtual_call_on_merged_receiver() {
    let program = load("hash_code.json");
    let (events, log) = event_log();
    let result = analyze(&program, Box::new(ContextInsensitive), vec![log]);

    assert_eq!(
        pts_types(&result, "Main.main()", "b"),
        BTreeSet::from(["A".to_string(), "B".to_string()])
    );
    let call = call_site(&program, "Main.main()", 0);
    assert_eq!(
        callee_names(&result, call),
        BTreeSet::from(["A.hashCode()".to_string(), "B.hashCode()".to_string()])
    );
    assert!(result.unresolved_calls().is_empty());

    let events = events.borrow();
    assert_eq!(events.started, 1);
    assert_eq!(events.finished, 1);
    assert_eq!(events.call_edges.len(), 2);
    assert_eq!(events.new_methods.len(), 3);
    assert_eq!(events.empty_deltas, 0);
}

#[test]
fn receivers_arriving_late_are_dispatched() {
    let program = load("late_receiver.json");
    let result = analyze(&program, Box::new(ContextInsensitive), Vec::new());

    // The B object reaches `x` through a field written by a callee that only
    // becomes reachable after the call on `x` was first processed.
    assert_eq!(
        pts_types(&result, "Main.main()", "x"),
        BTreeSet::from(["A".to_string(), "B".to_string()])
    );
    let call = call_site(&program, "Main.main()", 0);
    assert_eq!(
        callee_names(&result, call),
        BTreeSet::from(["A.hashCode()".to_string(), "B.hashCode()".to_string()])
    );
    assert!(result.is_reachable(method(&program, "H.fill()")));
}

#[test]
fn points_to_sets_only_grow() {
    let program = load("late_receiver.json");
    let (events, log) = event_log();
    analyze(&program, Box::new(KCallSiteSensitive::new(1)), vec![log]);

    let events = events.borrow();
    assert_eq!(events.empty_deltas, 0);
    for sizes in events.pts_sizes.values() {
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]), "{:?}", sizes);
    }
}

#[test]
fn unresolved_calls_are_reported_once_per_receiver_and_call_site() {
    let program = load("unresolved.json");
    let run = call_site(&program, "Main.call(I)", 0);

    let (events, log) = event_log();
    let result = analyze(&program, Box::new(ContextInsensitive), vec![log]);
    assert_eq!(events.borrow().unresolved.len(), 1);
    assert_eq!(result.unresolved_calls().len(), 1);
    let (recv, _, callsite) = events.borrow().unresolved[0];
    assert_eq!(callsite, run);
    let recv_obj = result.csm().get_obj(result.csm().cs_obj(recv).obj);
    assert_eq!(program.get_type(recv_obj.ty).name, "C");
    // Only the implementing receiver contributes an edge.
    assert_eq!(
        callee_names(&result, run),
        BTreeSet::from(["R.run()".to_string()])
    );

    // The two calls passing the C object analyze `call` under distinct contexts.
    let (events, log) = event_log();
    let result = analyze(&program, Box::new(KCallSiteSensitive::new(1)), vec![log]);
    let events = events.borrow();
    assert_eq!(events.unresolved.len(), 2);
    assert_ne!(events.unresolved[0].1, events.unresolved[1].1);
    assert_eq!(result.unresolved_calls().len(), 2);
    let run_edges = result
        .cs_call_edges()
        .filter(|e| result.csm().cs_callsite(e.callsite).callsite == run)
        .count();
    assert_eq!(run_edges, 1);
}

#[test]
fn fields_arrays_statics_and_casts() {
    let program = load("heap.json");
    let result = analyze(&program, Box::new(ContextInsensitive), Vec::new());
    let main = "Main.main()";
    let ab = BTreeSet::from(["A".to_string(), "B".to_string()]);

    assert_eq!(pts_types(&result, main, "o"), ab);
    assert_eq!(pts_types(&result, main, "c"), BTreeSet::from(["A".to_string()]));
    assert_eq!(pts_types(&result, main, "s"), BTreeSet::from(["B".to_string()]));
    assert_eq!(pts_types(&result, main, "t"), BTreeSet::from(["A".to_string()]));

    let arr = var(&program, main, "arr");
    let arr_obj = *result.points_to_set_of(arr).iter().next().unwrap();
    assert_eq!(result.array_points_to_set_of(arr_obj).len(), 2);

    let h = var(&program, main, "h");
    let h_obj = *result.points_to_set_of(h).iter().next().unwrap();
    let f = program.field_by_name("H.f").unwrap();
    assert_eq!(
        result.field_points_to_set_of(h_obj, f),
        result.points_to_set_of(var(&program, main, "a"))
    );
    let g = program.field_by_name("Main.g").unwrap();
    assert_eq!(
        result.static_field_points_to_set_of(g),
        result.points_to_set_of(var(&program, main, "b"))
    );
}

#[test]
fn context_sensitivity_separates_calls() {
    let program = load("precision.json");
    let main = "Main.main()";
    let a = BTreeSet::from(["A".to_string()]);
    let b = BTreeSet::from(["B".to_string()]);
    let ab = BTreeSet::from(["A".to_string(), "B".to_string()]);

    let ci = analyze(&program, Box::new(ContextInsensitive), Vec::new());
    assert_eq!(pts_types(&ci, main, "x"), ab);
    assert_eq!(pts_types(&ci, main, "i"), ab);

    let cfa = analyze(&program, Box::new(KCallSiteSensitive::new(1)), Vec::new());
    assert_eq!(pts_types(&cfa, main, "x"), a);
    assert_eq!(pts_types(&cfa, main, "y"), b);
    assert_eq!(pts_types(&cfa, main, "i"), a);
    assert_eq!(pts_types(&cfa, main, "j"), b);

    // Static calls inherit the caller context under object sensitivity.
    let obj = analyze(&program, Box::new(KObjectSensitive::new(1)), Vec::new());
    assert_eq!(pts_types(&obj, main, "x"), a);
    assert_eq!(pts_types(&obj, main, "y"), b);
    assert_eq!(pts_types(&obj, main, "i"), ab);

    // Both boxes are allocated in Main, so their methods share a context.
    let ty = analyze(&program, Box::new(KTypeSensitive::new(1)), Vec::new());
    assert_eq!(pts_types(&ty, main, "x"), ab);
}

#[test]
fn zero_depth_selectors_match_the_insensitive_analysis() {
    for name in ["hash_code.json", "late_receiver.json", "heap.json", "precision.json", "unresolved.json"] {
        let program = load(name);
        let ci = analyze(&program, Box::new(ContextInsensitive), Vec::new());
        assert_eq!(ci.num_contexts(), 1);
        let expected = snapshot(&ci);

        let selectors: Vec<Box<dyn ContextSelector>> = vec![
            Box::new(KCallSiteSensitive::new(0)),
            Box::new(KObjectSensitive::new(0)),
            Box::new(KTypeSensitive::new(0)),
        ];
        for selector in selectors {
            let result = analyze(&program, selector, Vec::new());
            assert_eq!(result.num_contexts(), 1, "{}", name);
            assert_eq!(snapshot(&result), expected, "{}", name);
        }

        // Contexts only ever split points-to sets.
        let cs = analyze(&program, Box::new(KCallSiteSensitive::new(2)), Vec::new());
        assert!(snapshot(&cs).is_subsumed_by(&expected), "{}", name);
    }
}

fn selector_for(pta_type: PTAType, depth: u32) -> Box<dyn ContextSelector> {
    let mut options = AnalysisOptions::default();
    options.pta_type = pta_type;
    options.context_depth = depth;
    make_selector(&options)
}

#[test]
fn worklist_order_does_not_change_the_fixpoint() {
    let analyses = [
        (PTAType::CallSiteSensitive, 1),
        (PTAType::CallSiteSensitive, 2),
        (PTAType::ObjectSensitive, 1),
        (PTAType::TypeSensitive, 1),
    ];
    let orders = [
        WorklistOrder::Lifo,
        WorklistOrder::Random(1),
        WorklistOrder::Random(42),
        WorklistOrder::Random(2024),
    ];
    for name in ["hash_code.json", "late_receiver.json", "heap.json", "precision.json", "unresolved.json"] {
        let program = load(name);
        for (pta_type, depth) in analyses {
            let fifo = snapshot(&analyze(&program, selector_for(pta_type, depth), Vec::new()));
            for order in orders {
                let solver = Solver::new(&program, selector_for(pta_type, depth), order);
                assert_eq!(
                    snapshot(&solver.solve()),
                    fifo,
                    "{} {:?}-{} {:?}",
                    name,
                    pta_type,
                    depth,
                    order
                );
            }
        }
    }
}

#[test]
fn heap_contents_are_part_of_the_fixpoint() {
    let program = load("heap.json");
    let result = analyze(&program, selector_for(PTAType::ObjectSensitive, 1), Vec::new());
    let heap = snapshot(&result).heap;
    let names = |objs: &[&str]| objs.iter().map(|o| o.to_string()).collect::<BTreeSet<_>>();
    assert_eq!(heap["Main.g"], names(&["Main.main()@new1:B"]));
    assert_eq!(heap["Main.main()@new3:H.f"], names(&["Main.main()@new0:A"]));
    assert_eq!(
        heap["Main.main()@new2:Arr[*]"],
        names(&["Main.main()@new0:A", "Main.main()@new1:B"])
    );
}

#[test]
fn methods_are_reported_once_per_context() {
    let program = load("precision.json");
    let (events, log) = event_log();
    let result = analyze(&program, Box::new(KCallSiteSensitive::new(1)), vec![log]);
    let events = events.borrow();

    let id = method(&program, "Main.id(Object)");
    assert_eq!(events.new_methods.iter().filter(|m| **m == id).count(), 1);
    let id_contexts = events
        .new_cs_methods
        .iter()
        .filter(|m| result.csm().cs_method(**m).method == id)
        .count();
    assert_eq!(id_contexts, 2);
    assert_eq!(events.new_methods.len(), result.reachable_methods().len());
    assert_eq!(events.call_edges.len(), result.cs_call_edges().count());
}

#[test]
fn native_results_are_modeled() {
    let program = load("native.json");
    let result = analyze(&program, Box::new(ContextInsensitive), vec![Box::new(NativeModeler::new())]);
    let r: Vec<String> = result
        .points_to_set_of(var(&program, "Main.main()", "r"))
        .into_iter()
        .map(|o| result.obj_name(o))
        .collect();
    assert_eq!(r, vec!["<native-result:Object.clone():Object>".to_string()]);

    let result = analyze(&program, Box::new(ContextInsensitive), Vec::new());
    assert!(result
        .points_to_set_of(var(&program, "Main.main()", "r"))
        .is_empty());
}

/// Feeds a mock object into `Main.main()/x` once `main` is reachable.
struct InjectReceiver {
    ty: TypeId,
}

impl Plugin for InjectReceiver {
    fn on_new_cs_method(&mut self, solver: &mut Solver<'_>, cs_method: CSMethodId) {
        let program = solver.program();
        let cs_method = solver.csm().cs_method(cs_method);
        if program.method_name(cs_method.method) != "Main.main()" {
            return;
        }
        let x = program.var_by_name(cs_method.method, "x").unwrap();
        let obj = solver.new_mock_obj("injected", self.ty, None);
        let cs_obj = solver.get_cs_obj(ContextId::EMPTY, obj);
        solver.add_var_points_to(cs_method.cid, x, cs_obj);
    }
}

#[test]
fn facts_injected_by_plugins_are_propagated() {
    let program = load("native.json");
    let a = program.type_by_name("A").unwrap();
    let result = analyze(&program, Box::new(ContextInsensitive), vec![Box::new(InjectReceiver { ty: a })]);

    let hash_code = call_site(&program, "Main.main()", 1);
    assert_eq!(
        callee_names(&result, hash_code),
        BTreeSet::from(["A.hashCode()".to_string()])
    );
    assert!(result.is_reachable(method(&program, "A.hashCode()")));
}

/// Adds a static call edge under the empty context when the analysis starts.
struct InjectCallEdge {
    callsite: CallSiteId,
    callee: MethodId,
}

impl Plugin for InjectCallEdge {
    fn on_start(&mut self, solver: &mut Solver<'_>) {
        let callsite = solver.get_cs_callsite(ContextId::EMPTY, self.callsite);
        let callee = solver.get_cs_method(ContextId::EMPTY, self.callee);
        solver.add_call_edge(CSCallEdge {
            kind: CallKind::Static,
            callsite,
            callee,
        });
    }
}

#[test]
fn injected_call_edges_need_a_reachable_caller() {
    let program = load("dead_caller.json");
    let dead = method(&program, "Main.dead()");
    let target = method(&program, "Main.target()");

    let from_dead = InjectCallEdge {
        callsite: call_site(&program, "Main.dead()", 0),
        callee: target,
    };
    let result = analyze(&program, Box::new(ContextInsensitive), vec![Box::new(from_dead)]);
    assert!(!result.is_reachable(dead));
    assert!(!result.is_reachable(target));
    assert_eq!(result.reachable_methods().len(), 2);
    assert!(result
        .points_to_set_of(var(&program, "Main.dead()", "a"))
        .is_empty());
    assert!(result.call_graph().iter().all(|(_, callee)| *callee != target));

    let main_call = call_site(&program, "Main.main()", 0);
    let from_main = InjectCallEdge {
        callsite: main_call,
        callee: target,
    };
    let result = analyze(&program, Box::new(ContextInsensitive), vec![Box::new(from_main)]);
    assert!(result.is_reachable(target));
    assert!(!result.is_reachable(dead));
    assert_eq!(
        callee_names(&result, main_call),
        BTreeSet::from(["Main.other()".to_string(), "Main.target()".to_string()])
    );
    // The injected edge binds the callee's return value like a discovered one.
    assert_eq!(pts_types(&result, "Main.main()", "r"), BTreeSet::from(["A".to_string()]));
}

/// Resolves nothing.
struct NoDispatch;

impl DispatchResolver for NoDispatch {
    fn resolve_callee(&self, _recv_type: Option<TypeId>, _callsite: CallSiteId) -> Option<MethodId> {
        None
    }

    fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        sub == sup
    }
}

#[test]
fn resolver_can_be_replaced() {
    let program = load("hash_code.json");
    let result = Solver::new(&program, Box::new(ContextInsensitive), WorklistOrder::Fifo)
        .with_resolver(Box::new(NoDispatch))
        .solve();
    assert!(result.call_graph().is_empty());
    assert_eq!(result.reachable_methods().len(), 1);
    // One report for each object reaching the receiver.
    assert_eq!(result.unresolved_calls().len(), 2);
}

#[test]
fn default_plugins_see_unresolved_calls() {
    let program = load("unresolved.json");
    let options = AnalysisOptions {
        pta_type: PTAType::ContextInsensitive,
        ..AnalysisOptions::default()
    };
    let result = run_pointer_analysis(&program, &options);
    assert_eq!(result.unresolved_calls().len(), 1);
    let (recv, cs_callsite) = result.unresolved_calls()[0];
    assert_eq!(
        result.csm().cs_callsite(cs_callsite).callsite,
        call_site(&program, "Main.call(I)", 0)
    );
    assert!(result.cs_obj_name(recv).ends_with(":C"));
}

#[test]
fn driver_runs_and_dumps() {
    let program = load("precision.json");
    let mut options = AnalysisOptions::default();
    options.pta_type = PTAType::ObjectSensitive;
    let result = run_pointer_analysis(&program, &options);
    assert_eq!(
        pts_types(&result, "Main.main()", "x"),
        BTreeSet::from(["A".to_string()])
    );

    let mut pts = Vec::new();
    results_dumper::dump_ci_pts(&result, &mut pts).unwrap();
    let pts = String::from_utf8(pts).unwrap();
    assert!(pts.contains("Main.main()\n"));
    assert!(pts.contains("\tx (1) ==> { Main.main()@new0:A }"));

    let mut dot = Vec::new();
    results_dumper::dump_call_graph(&result, &mut dot).unwrap();
    let dot = String::from_utf8(dot).unwrap();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("Box.get()"));

    let mut stats = Vec::new();
    PTAStat::new(&result).dump_stats_to(&mut stats).unwrap();
    let stats = String::from_utf8(stats).unwrap();
    assert!(stats.contains("#Reachable methods: 4"));
}
