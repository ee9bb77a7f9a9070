// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use std::{cell::RefCell, rc::Rc};

use common::{Fixture, import, read, root};
use modlink::{
    Endowments, Error, Function, FunctorError, FunctorScope, ImportedBinding, ImporterOptions,
    LinkErrorKind, ModuleStatus, RetrievalErrorKind, Subscriptions, Value,
};
use pretty_assertions::assert_eq;

/// Evaluates the dependencies and does nothing else.
fn plain(scope: &mut FunctorScope<'_>) -> Result<(), FunctorError> {
    scope.imports(Subscriptions::new())?;
    Ok(())
}

/// Evaluates the dependencies, then records `name` in `log`.
fn logged(
    log: &Rc<RefCell<Vec<&'static str>>>,
    name: &'static str,
) -> impl Fn(&mut FunctorScope<'_>) -> Result<(), FunctorError> + 'static {
    let log = log.clone();
    move |scope: &mut FunctorScope<'_>| {
        scope.imports(Subscriptions::new())?;
        log.borrow_mut().push(name);
        Ok(())
    }
}

fn keys(namespace: &modlink::Namespace) -> Vec<String> {
    namespace.keys().map(str::to_owned).collect()
}

#[test]
fn live_exports_propagate_to_importers() {
    let fixture = Fixture::new();
    fixture
        .module("def", "export let lo = 456; lo++;", |scope| {
            let lo = scope.live_var();
            lo.set("lo", 456)?;
            let current = lo.get("lo").and_then(|value| value.as_number());
            lo.set("lo", current.unwrap_or_default() + 1.0)?;
            Ok(())
        })
        .module(
            "abc",
            "import { lo } from './def'; export { lo as def };",
            plain,
        );
    let importer = fixture.importer(ImporterOptions::default());
    let namespace = import(&importer, "./abc").unwrap();
    assert_eq!(keys(&namespace), ["def"]);
    assert_eq!(read(&namespace, "def"), Value::from(457));
}

#[test]
fn live_exports_update_after_evaluation() {
    let fixture = Fixture::new();
    fixture
        .module(
            "counter",
            "export let count = 0; export function increment() { count += 1; }",
            |scope| {
                let live = scope.live_var();
                let handle = live.clone();
                live.set(
                    "increment",
                    Function::new(move |_| {
                        let count = handle.get("count").and_then(|value| value.as_number());
                        handle
                            .set("count", count.unwrap_or_default() + 1.0)
                            .map_err(|error| Value::from(error.to_string()))?;
                        Ok(Value::Undefined)
                    }),
                )?;
                live.set("count", 0)?;
                Ok(())
            },
        )
        .module(
            "main",
            "import { count, increment } from './counter'; increment(); export let seen = count;",
            |scope| {
                let count = scope.binding("count");
                let increment = scope.binding("increment");
                scope.imports(
                    Subscriptions::new()
                        .bind("./counter", "count", &count)
                        .bind("./counter", "increment", &increment),
                )?;
                let Some(increment) = increment.get()?.as_function().cloned() else {
                    return Err(FunctorError::Throw("increment is not a function".into()));
                };
                increment.call(&[]).map_err(FunctorError::Throw)?;
                scope.live_var().set("seen", count.get()?)?;
                Ok(())
            },
        );
    let importer = fixture.importer(ImporterOptions::default());
    let main = import(&importer, "./main").unwrap();
    assert_eq!(read(&main, "seen"), Value::from(1));

    let counter = import(&importer, "./counter").unwrap();
    assert_eq!(read(&counter, "count"), Value::from(1));
    let increment = read(&counter, "increment");
    increment.as_function().unwrap().call(&[]).unwrap();
    assert_eq!(read(&counter, "count"), Value::from(2));
    assert_eq!(fixture.runs(), ["main", "counter"]);
}

#[test]
fn modules_evaluate_once_across_diamonds_and_self_cycles() {
    let fixture = Fixture::new();
    fixture
        .module("main", "import './left'; import './right';", plain)
        .module("left", "import './shared';", plain)
        .module("right", "import './shared';", plain)
        .module(
            "shared",
            "import './shared'; export const id = 1;",
            |scope| {
                scope.imports(Subscriptions::new())?;
                scope.once_var().set("id", 1)?;
                Ok(())
            },
        );
    let importer = fixture.importer(ImporterOptions::default());
    import(&importer, "./main").unwrap();
    import(&importer, "./left").unwrap();
    let shared = import(&importer, "./shared").unwrap();
    assert_eq!(read(&shared, "id"), Value::from(1));

    let mut runs = fixture.runs();
    runs.sort();
    assert_eq!(runs, ["left", "main", "right", "shared"]);
}

#[test]
fn dependencies_evaluate_before_their_importers() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let fixture = Fixture::new();
    fixture
        .module("main", "import './a'; import './b';", logged(&log, "main"))
        .module("a", "import './c';", logged(&log, "a"))
        .module("b", "", logged(&log, "b"))
        .module("c", "", logged(&log, "c"));
    let importer = fixture.importer(ImporterOptions::default());
    import(&importer, "./main").unwrap();
    assert_eq!(*log.borrow(), ["c", "a", "b", "main"]);
}

#[test]
fn dependencies_evaluate_after_a_body_without_imports() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let fixture = Fixture::new();
    let main_log = log.clone();
    fixture
        .module("main", "import './dep';", move |_| {
            main_log.borrow_mut().push("main");
            Ok(())
        })
        .module("dep", "", logged(&log, "dep"));
    let importer = fixture.importer(ImporterOptions::default());
    import(&importer, "./main").unwrap();
    assert_eq!(*log.borrow(), ["main", "dep"]);
}

#[test]
fn cycles_terminate_with_cross_resolved_bindings() {
    let fixture = Fixture::new();
    fixture
        .module(
            "a",
            "import { bValue } from './b'; export function getA() { return 'a'; } export let seen = bValue;",
            |scope| {
                let live = scope.live_var();
                live.set("getA", Function::new(|_| Ok(Value::from("a"))))?;
                let b_value = scope.binding("bValue");
                scope.imports(Subscriptions::new().bind("./b", "bValue", &b_value))?;
                live.set("seen", b_value.get()?)?;
                Ok(())
            },
        )
        .module(
            "b",
            "import { getA } from './a'; export const bValue = getA();",
            |scope| {
                let get_a = scope.binding("getA");
                scope.imports(Subscriptions::new().bind("./a", "getA", &get_a))?;
                let Some(get_a) = get_a.get()?.as_function().cloned() else {
                    return Err(FunctorError::Throw("getA is not a function".into()));
                };
                let value = get_a.call(&[]).map_err(FunctorError::Throw)?;
                scope.once_var().set("bValue", value)?;
                Ok(())
            },
        );
    let importer = fixture.importer(ImporterOptions::default());
    let a = import(&importer, "./a").unwrap();
    assert_eq!(read(&a, "seen"), Value::from("a"));
    let b = import(&importer, "./b").unwrap();
    assert_eq!(read(&b, "bValue"), Value::from("a"));
    assert_eq!(fixture.runs(), ["a", "b"]);
    for instance in importer.modules().instances() {
        assert!(matches!(*instance.status(), ModuleStatus::Evaluated));
    }
}

#[test]
fn reading_before_initialization_is_a_temporal_dead_zone_error() {
    let seen_by_b: Rc<RefCell<Vec<ImportedBinding>>> = Rc::default();
    let fixture = Fixture::new();
    let bindings = seen_by_b.clone();
    fixture
        .module("a", "import './b'; export const x = 1;", |scope| {
            scope.imports(Subscriptions::new())?;
            scope.once_var().set("x", 1)?;
            Ok(())
        })
        .module(
            "b",
            "import { x } from './a'; export let sawTdz = false; try { x } catch { sawTdz = true; }",
            move |scope| {
                let x = scope.binding("x");
                scope.imports(Subscriptions::new().bind("./a", "x", &x))?;
                scope.live_var().set("sawTdz", x.get().is_err())?;
                bindings.borrow_mut().push(x);
                Ok(())
            },
        );
    let importer = fixture.importer(ImporterOptions::default());
    let module = importer
        .link("./a", &root(), &Endowments::default())
        .unwrap();
    let early = importer.modules().namespace(module);
    let error = early.get("x").unwrap_err();
    assert_eq!(&*error.name, "x");
    assert_eq!(error.location.as_str(), "https://www.example.com/a");

    let a = import(&importer, "./a").unwrap();
    assert!(a.ptr_eq(&early));
    assert_eq!(read(&a, "x"), Value::from(1));
    let b = import(&importer, "./b").unwrap();
    assert_eq!(read(&b, "sawTdz"), Value::from(true));
    assert_eq!(seen_by_b.borrow()[0].get().unwrap(), Value::from(1));
}

#[test]
fn namespaces_are_sorted_and_stable() {
    let fixture = Fixture::new();
    fixture
        .module(
            "m",
            "export const b = 1; export let a; export function Z() {} export * from './star';",
            |scope| {
                scope.live_var().set("Z", Function::new(|_| Ok(Value::Null)))?;
                scope.imports(Subscriptions::new())?;
                scope.once_var().set("b", 1)?;
                Ok(())
            },
        )
        .module(
            "star",
            "export const fromStar = 1; export default 2;",
            |scope| {
                scope.once_var().set("fromStar", 1)?;
                scope.once_var().set("*default*", 2)?;
                Ok(())
            },
        );
    let importer = fixture.importer(ImporterOptions::default());
    let first = import(&importer, "./m").unwrap();
    let second = import(&importer, "./m").unwrap();
    assert_eq!(keys(&first), ["Z", "a", "b", "fromStar"]);
    assert_eq!(keys(&first), keys(&second));
    assert!(first.ptr_eq(&second));
    assert!(first.get("a").is_err());
    assert_eq!(read(&first, "fromStar"), Value::from(1));
    assert_eq!(read(&first, "default"), Value::Undefined);
}

#[test]
fn conflicting_star_exports_are_ambiguous() {
    let fixture = Fixture::new();
    fixture
        .module("x", "export * from './p'; export * from './q';", plain)
        .module(
            "p",
            "export const shared = 1; export const onlyP = 2;",
            |scope| {
                scope.once_var().set("shared", 1)?;
                scope.once_var().set("onlyP", 2)?;
                Ok(())
            },
        )
        .module("q", "export const shared = 3;", |scope| {
            scope.once_var().set("shared", 3)?;
            Ok(())
        })
        .module("y", "import { shared } from './x';", plain);

    let importer = fixture.importer(ImporterOptions::default());
    let Err(Error::Link(error)) = import(&importer, "./y") else {
        panic!("expected a link error");
    };
    assert_eq!(error.kind, LinkErrorKind::AmbiguousExport);
    assert_eq!(&*error.name, "shared");
    assert!(fixture.runs().is_empty());

    let x = import(&importer, "./x").unwrap();
    assert_eq!(keys(&x), ["onlyP"]);
    assert_eq!(read(&x, "onlyP"), Value::from(2));
}

#[test]
fn namespace_imports_and_reexports_share_the_namespace() {
    let received = Rc::new(RefCell::new(None));
    let fixture = Fixture::new();
    let slot = received.clone();
    fixture
        .module("dep", "export const value = 7;", |scope| {
            scope.once_var().set("value", 7)?;
            Ok(())
        })
        .module("outer", "export * as inner from './dep';", plain)
        .module("main", "import * as dep from './dep';", move |scope| {
            let slot = slot.clone();
            scope.imports(Subscriptions::new().on("./dep", "*", move |value| {
                slot.replace(Some(value.clone()));
            }))?;
            Ok(())
        });
    let importer = fixture.importer(ImporterOptions::default());
    import(&importer, "./main").unwrap();
    let outer = import(&importer, "./outer").unwrap();
    let dep = import(&importer, "./dep").unwrap();

    let received = received.borrow().clone().unwrap();
    assert!(received.as_namespace().unwrap().ptr_eq(&dep));
    let inner = read(&outer, "inner");
    assert!(inner.as_namespace().unwrap().ptr_eq(&dep));
    assert_eq!(
        read(inner.as_namespace().unwrap(), "value"),
        Value::from(7)
    );
}

#[test]
fn missing_exports_fail_before_any_body_runs() {
    let fixture = Fixture::new();
    fixture
        .module("main", "import { nope } from './dep';", plain)
        .module("dep", "export const yes = 1;", |scope| {
            scope.once_var().set("yes", 1)?;
            Ok(())
        });
    let importer = fixture.importer(ImporterOptions::default());
    let Err(Error::Link(error)) = import(&importer, "./main") else {
        panic!("expected a link error");
    };
    assert_eq!(error.kind, LinkErrorKind::MissingExport);
    assert_eq!(&*error.specifier, "./dep");
    assert_eq!(error.location.as_str(), "https://www.example.com/main");
    assert!(fixture.runs().is_empty());
}

#[test]
fn unknown_specifiers_in_imports_fail_the_module() {
    let fixture = Fixture::new();
    fixture.module("main", "", |scope| {
        scope.imports(Subscriptions::new().on("./nowhere", "x", |_| {}))?;
        Ok(())
    });
    let importer = fixture.importer(ImporterOptions::default());
    let Err(Error::Link(error)) = import(&importer, "./main") else {
        panic!("expected a link error");
    };
    assert_eq!(error.kind, LinkErrorKind::UnknownSpecifier);
    let Err(Error::Link(again)) = import(&importer, "./main") else {
        panic!("expected the cached link error");
    };
    assert_eq!(again.kind, LinkErrorKind::UnknownSpecifier);
    assert_eq!(fixture.runs(), ["main"]);
}

#[test]
fn evaluation_failures_are_cached() {
    let fixture = Fixture::new();
    fixture
        .module("user", "import './boom'; export const ok = 1;", plain)
        .module("boom", "throw 'boom';", |_| {
            Err(FunctorError::Throw(Value::from("boom")))
        });
    let importer = fixture.importer(ImporterOptions {
        retain_failures: false,
    });
    for _ in 0..2 {
        let Err(Error::FunctorEvaluation(error)) = import(&importer, "./user") else {
            panic!("expected an evaluation error");
        };
        assert_eq!(error.location.as_str(), "https://www.example.com/boom");
        assert_eq!(error.thrown, Value::from("boom"));
    }
    assert_eq!(fixture.runs(), ["user", "boom"]);
}

#[test]
fn dependency_failures_fail_bodies_that_swallow_them() {
    let fixture = Fixture::new();
    fixture
        .module("user", "import './boom';", |scope| {
            let _ = scope.imports(Subscriptions::new());
            Ok(())
        })
        .module("boom", "throw 'boom';", |_| {
            Err(FunctorError::Throw(Value::from("boom")))
        });
    let importer = fixture.importer(ImporterOptions::default());
    let Err(Error::FunctorEvaluation(error)) = import(&importer, "./user") else {
        panic!("expected an evaluation error");
    };
    assert_eq!(error.location.as_str(), "https://www.example.com/boom");
    assert_eq!(error.thrown, Value::from("boom"));
    for instance in importer.modules().instances() {
        assert_eq!(instance.status().name(), "errored");
    }
}

#[test]
fn evaluation_failures_error_the_whole_cycle() {
    let fixture = Fixture::new();
    fixture
        .module("a", "import './b';", plain)
        .module("b", "import './a'; throw 1;", |scope| {
            scope.imports(Subscriptions::new())?;
            Err(FunctorError::Throw(Value::from(1)))
        });
    let importer = fixture.importer(ImporterOptions::default());
    for specifier in ["./a", "./b", "./a"] {
        let Err(error) = import(&importer, specifier) else {
            panic!("expected {specifier} to replay the failure");
        };
        assert_eq!(error.to_string(), "https://www.example.com/b threw 1");
    }
    let statuses: Vec<_> = importer
        .modules()
        .instances()
        .iter()
        .map(|instance| instance.status().name())
        .collect();
    assert_eq!(statuses, ["errored", "errored"]);
    assert_eq!(fixture.runs(), ["a", "b"]);
}

#[test]
fn functor_source_failures_skip_the_body() {
    let fixture = Fixture::new();
    fixture.source_only("opaque", "export const x = 1;");
    let importer = fixture.importer(ImporterOptions::default());
    let Err(Error::FunctorEvaluation(error)) = import(&importer, "./opaque") else {
        panic!("expected an evaluation error");
    };
    assert_eq!(error.location.as_str(), "https://www.example.com/opaque");
    assert_eq!(
        error.thrown,
        Value::from("no body for https://www.example.com/opaque")
    );
    let instances = importer.modules().instances();
    let [instance] = &instances[..] else {
        panic!("expected a single module");
    };
    assert!(matches!(*instance.status(), ModuleStatus::Errored(_)));
    assert!(fixture.runs().is_empty());
}

#[test]
fn retrieval_and_resolution_errors_carry_their_location() {
    let fixture = Fixture::new();
    fixture.module("main", "import './missing';", plain);
    let importer = fixture.importer(ImporterOptions::default());
    let Err(Error::Retrieval(error)) = import(&importer, "./main") else {
        panic!("expected a retrieval error");
    };
    assert!(matches!(error.kind, RetrievalErrorKind::NotFound));
    assert_eq!(
        error.location.as_str(),
        "https://www.example.com/missing.js"
    );

    let Err(Error::Resolution(error)) = import(&importer, "https://elsewhere.com/x") else {
        panic!("expected a resolution error");
    };
    assert_eq!(&*error.specifier, "https://elsewhere.com/x");
}

#[test]
fn syntax_errors_are_analysis_errors() {
    let fixture = Fixture::new();
    fixture.module("broken", "export const = ;", plain);
    let importer = fixture.importer(ImporterOptions::default());
    let Err(Error::Analysis(error)) = import(&importer, "./broken") else {
        panic!("expected an analysis error");
    };
    assert!(!error.diagnostics.is_empty());
}

#[test]
fn endowments_reach_module_bodies() {
    let fixture = Fixture::new();
    fixture.module("main", "export const answer = endowed;", |scope| {
        let answer = scope.endowments().get("answer").cloned().unwrap_or_default();
        scope.once_var().set("answer", answer)?;
        Ok(())
    });
    let importer = fixture.importer(ImporterOptions::default());
    let namespace = importer
        .import("./main", &root(), &Endowments::new().with("answer", 42))
        .unwrap();
    assert_eq!(read(&namespace, "answer"), Value::from(42));
}
