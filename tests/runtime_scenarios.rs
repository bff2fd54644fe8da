//! End-to-end dispatch scenarios through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use esapi_core::{
    ActionError, BlockAction, ConditionArgs, ConditionRef, ConfigError, CustomAction, CustomRule,
    Fault, HttpExchange, HttpRequest, ObjectRepository, Rule, Runtime, RuntimeEvent,
    RuntimeEventArgs, UrlCondition, ValueCondition,
};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

fn exchange(url: &str) -> HttpExchange {
    HttpExchange::new(HttpRequest::new("req-1", url))
}

fn counting_rule(name: &str, events: &[RuntimeEvent], hits: &Arc<AtomicUsize>) -> Arc<dyn Rule> {
    let hits = Arc::clone(hits);
    Arc::new(CustomRule::new(name, events, move |_, _| {
        hits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }))
}

fn failing_rule(name: &str, events: &[RuntimeEvent]) -> Arc<dyn Rule> {
    Arc::new(CustomRule::new(name, events, |_, _| {
        Err(Fault::invalid_operation("rule failed"))
    }))
}

#[test]
fn false_condition_gates_rules_and_subcontexts() {
    init_tracing();
    let runtime = Runtime::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let gated = runtime.create_context_named("gated").unwrap();
    gated.bind_condition(ConditionRef::new(ValueCondition::new(true)), true);
    gated.bind_condition(ConditionRef::new(ValueCondition::new(false)), true);
    gated.bind_rule(counting_rule("outer", &RuntimeEvent::ALL, &hits));

    let nested = gated.create_subcontext_named("nested").unwrap();
    nested.bind_rule(counting_rule("inner", &RuntimeEvent::ALL, &hits));

    for event in RuntimeEvent::ALL {
        runtime.dispatch(event, exchange("/")).unwrap();
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn shared_condition_is_evaluated_once_per_dispatch() {
    init_tracing();
    let runtime = Runtime::new();
    let evaluations = Arc::new(AtomicUsize::new(0));
    let condition = {
        let evaluations = Arc::clone(&evaluations);
        ConditionRef::new(move |_: &ConditionArgs<'_>| {
            evaluations.fetch_add(1, Ordering::SeqCst);
            true
        })
    };

    // Same condition, opposite expectations: exactly one context matches.
    let hits_a = Arc::new(AtomicUsize::new(0));
    let hits_b = Arc::new(AtomicUsize::new(0));
    let a = runtime.create_context_named("a").unwrap();
    a.bind_condition(condition.clone(), true);
    a.bind_rule(counting_rule("a", &[RuntimeEvent::PreRequestHandlerExecute], &hits_a));
    let b = runtime.create_context_named("b").unwrap();
    b.bind_condition(condition, false);
    b.bind_rule(counting_rule("b", &[RuntimeEvent::PreRequestHandlerExecute], &hits_b));

    let args = runtime
        .dispatch(RuntimeEvent::PreRequestHandlerExecute, exchange("/"))
        .unwrap();
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);
    assert_eq!(args.cached_evaluations(), 1);
    assert_eq!(hits_a.load(Ordering::SeqCst), 1);
    assert_eq!(hits_b.load(Ordering::SeqCst), 0);

    // A new dispatch starts with empty caches.
    runtime
        .dispatch(RuntimeEvent::PreRequestHandlerExecute, exchange("/"))
        .unwrap();
    assert_eq!(evaluations.load(Ordering::SeqCst), 2);
}

#[test]
fn context_stack_is_empty_after_faulting_dispatch() {
    init_tracing();
    let runtime = Runtime::new();
    let depth_seen = Arc::new(Mutex::new(Vec::new()));

    let root = runtime.create_context_named("root").unwrap();
    root.bind_rule(failing_rule("fails", &RuntimeEvent::ALL));
    let child = root.create_subcontext_named("child").unwrap();
    {
        let depth_seen = Arc::clone(&depth_seen);
        child.bind_rule(Arc::new(CustomRule::new(
            "depth",
            &RuntimeEvent::ALL,
            move |_, args: &mut RuntimeEventArgs| {
                depth_seen.lock().unwrap().push(args.depth());
                Err(Fault::intrusion("stop", "child rule fault"))
            },
        )));
    }

    let mut args = RuntimeEventArgs::new(exchange("/"));
    runtime
        .publish(RuntimeEvent::PostRequestHandlerExecute, &mut args)
        .unwrap();

    assert_eq!(*depth_seen.lock().unwrap(), vec![2]);
    assert_eq!(args.depth(), 0);
    assert!(args.current_context().is_none());
}

#[test]
fn later_rule_runs_after_earlier_rule_faults() {
    init_tracing();
    let runtime = Runtime::new();
    let hits = Arc::new(AtomicUsize::new(0));

    let context = runtime.create_context_named("x").unwrap();
    context.bind_rule(failing_rule("a", &[RuntimeEvent::PreRequestHandlerExecute]));
    context.bind_rule(counting_rule("b", &[RuntimeEvent::PreRequestHandlerExecute], &hits));

    runtime
        .dispatch(RuntimeEvent::PreRequestHandlerExecute, exchange("/"))
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn fault_action_runs_once_and_fault_is_contained() {
    init_tracing();
    let runtime = Runtime::new();
    let invocations = Arc::new(AtomicUsize::new(0));

    let context = runtime.create_context_named("A").unwrap();
    context.bind_condition(ConditionRef::new(ValueCondition::new(true)), true);
    let rule = context.bind_rule(failing_rule("R", &[RuntimeEvent::PreRequestHandlerExecute]));
    {
        let invocations = Arc::clone(&invocations);
        rule.add_fault_action(Arc::new(CustomAction::new("record", move |args| {
            assert_eq!(args.faulting_rule().name(), "R");
            assert_eq!(args.fault().message(), "rule failed");
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })));
    }

    let result = runtime.dispatch(RuntimeEvent::PreRequestHandlerExecute, exchange("/"));
    assert!(result.is_ok());
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[test]
fn failing_fault_action_is_recorded_and_chain_continues() {
    init_tracing();
    let runtime = Runtime::new();
    let context = runtime.create_context_named("A").unwrap();
    let rule = context.bind_rule(failing_rule("R", &[RuntimeEvent::PreRequestHandlerExecute]));
    rule.add_fault_action(Arc::new(CustomAction::new("broken", |_| {
        Err(ActionError::new("broken", "cannot run"))
    })));
    rule.add_fault_action(Arc::new(BlockAction::default()));

    let args = runtime
        .dispatch(RuntimeEvent::PreRequestHandlerExecute, exchange("/"))
        .unwrap();
    assert_eq!(args.exchange().response.status(), 403);
    assert!(args.exchange().response.is_ended());
    assert_eq!(args.action_failures().len(), 1);
    assert_eq!(args.action_failures()[0].rule(), "R");
    assert_eq!(args.action_failures()[0].failures()[0].action(), "broken");
}

#[test]
fn only_matching_sibling_runs() {
    init_tracing();
    let runtime = Runtime::new();
    let hits_a = Arc::new(AtomicUsize::new(0));
    let hits_b = Arc::new(AtomicUsize::new(0));

    let a = runtime.create_context_named("A").unwrap();
    a.bind_condition(ConditionRef::new(ValueCondition::new(false)), true);
    a.bind_rule(counting_rule("a", &[RuntimeEvent::PostRequestHandlerExecute], &hits_a));

    let b = runtime.create_context_named("B").unwrap();
    b.bind_condition(ConditionRef::new(ValueCondition::new(true)), true);
    b.bind_rule(counting_rule("b", &[RuntimeEvent::PostRequestHandlerExecute], &hits_b));

    runtime
        .dispatch(RuntimeEvent::PostRequestHandlerExecute, exchange("/"))
        .unwrap();
    assert_eq!(hits_a.load(Ordering::SeqCst), 0);
    assert_eq!(hits_b.load(Ordering::SeqCst), 1);
}

#[test]
fn duplicate_names_leave_registries_untouched() {
    init_tracing();
    let runtime = Runtime::new();
    let rule = failing_rule("r", &RuntimeEvent::ALL);

    runtime.rules().register("r", Arc::clone(&rule)).unwrap();
    let err = runtime.rules().register("r", rule).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateId(_)));
    assert_eq!(runtime.rules().count(), 1);

    let context = runtime.create_context_named("ctx").unwrap();
    assert!(runtime.create_context_named("ctx").is_err());
    assert_eq!(runtime.contexts().len(), 1);

    context.create_subcontext_named("sub").unwrap();
    assert!(context.create_subcontext_named("sub").is_err());
    assert_eq!(context.subcontexts().len(), 1);

    assert!(runtime.remove_context("missing").is_none());
    assert_eq!(runtime.contexts().len(), 1);
}

#[test]
fn url_scoped_context_only_sees_its_paths() {
    init_tracing();
    let runtime = Runtime::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let admin = runtime.create_context_named("admin").unwrap();
    admin.bind_condition(ConditionRef::new(UrlCondition::new("^/admin/").unwrap()), true);
    admin.bind_rule(counting_rule("admin", &RuntimeEvent::ALL, &hits));

    runtime
        .dispatch(RuntimeEvent::PreRequestHandlerExecute, exchange("/admin/users"))
        .unwrap();
    runtime
        .dispatch(RuntimeEvent::PreRequestHandlerExecute, exchange("/public"))
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
