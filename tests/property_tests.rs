//! Property tests for dispatch and canonicalization invariants.

use std::sync::Arc;

use esapi_core::{
    ConditionRef, Context, CustomRule, Encoder, EncoderConfig, Fault, HttpExchange, HttpRequest,
    RecordingLogger, Runtime, RuntimeEvent, RuntimeEventArgs, ValueCondition,
};
use proptest::prelude::*;

// Strategy: one context node as (parent slot, condition value, rule faults)
fn arb_node() -> impl Strategy<Value = (Option<usize>, bool, bool)> {
    (prop::option::of(0usize..8), any::<bool>(), any::<bool>())
}

fn arb_event() -> impl Strategy<Value = RuntimeEvent> {
    prop_oneof![
        Just(RuntimeEvent::PreRequestHandlerExecute),
        Just(RuntimeEvent::PostRequestHandlerExecute),
    ]
}

fn lenient_encoder(codecs: &[&str]) -> Encoder {
    let config = EncoderConfig {
        canonicalization_codecs: codecs.iter().map(|name| name.to_string()).collect(),
        strict: false,
        ..EncoderConfig::default()
    };
    Encoder::with_config(config, Arc::new(RecordingLogger::new()))
}

proptest! {
    /// Property: every dispatch pops each context frame it pushed,
    /// whatever the tree shape and whichever rules fault.
    #[test]
    fn proptest_context_stack_balances(
        nodes in prop::collection::vec(arb_node(), 1..12),
        event in arb_event(),
    ) {
        let runtime = Runtime::new();
        let mut built: Vec<Arc<Context>> = Vec::new();

        for (parent, condition, faults) in nodes {
            let context = match parent.filter(|slot| *slot < built.len()) {
                Some(slot) => built[slot].create_subcontext(),
                None => runtime.create_context(),
            };
            context.bind_condition(ConditionRef::new(ValueCondition::new(condition)), true);
            context.bind_rule(Arc::new(CustomRule::new(
                "probe",
                &RuntimeEvent::ALL,
                move |_, args: &mut RuntimeEventArgs| {
                    assert!(args.depth() > 0);
                    if faults {
                        Err(Fault::invalid_operation("probe fault"))
                    } else {
                        Ok(())
                    }
                },
            )));
            built.push(context);
        }

        let mut args = RuntimeEventArgs::new(HttpExchange::new(HttpRequest::new("req", "/")));
        prop_assert!(runtime.publish(event, &mut args).is_ok());
        prop_assert_eq!(args.depth(), 0);
    }

    /// Property: a successful lenient canonicalization is a fixed point.
    #[test]
    fn proptest_canonicalize_is_idempotent(
        input in prop::string::string_regex("[a-z0-9<>&#;%+xuA-F\\\\ ]{0,40}").unwrap()
    ) {
        let encoder = lenient_encoder(&["Html", "Url", "JavaScript"]);
        let once = encoder.canonicalize_default(&input);
        prop_assume!(once.is_ok());
        let once = once.unwrap();
        prop_assert_eq!(encoder.canonicalize_default(&once).unwrap(), once);
    }

    /// Property: idempotence holds for every built-in codec on its own.
    #[test]
    fn proptest_single_codec_fixed_point(
        codec in prop_oneof![
            Just("Html"), Just("HtmlAttribute"), Just("Xml"), Just("Url"),
            Just("Base64"), Just("JavaScript"), Just("VbScript"),
        ],
        input in "\\PC{0,24}"
    ) {
        let encoder = lenient_encoder(&[codec]);
        if let Ok(once) = encoder.canonicalize_default(&input) {
            prop_assert_eq!(encoder.canonicalize_default(&once).unwrap(), once);
        }
    }
}
