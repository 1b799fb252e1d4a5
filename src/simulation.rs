//! Installs a parsed simulation onto host-supplied collaborators: the
//! `interpret_simulation` entry point and the `AgentTemplate` registry
//! contract for wrapping agents and handing them to a driver.
//!
//! Grounded on `examples/original_source/interpreter/simulation_interpreter.py`'s
//! `SimulationInterpreter.interpret_simulation` (lex -> parse -> static check ->
//! per-agent instantiate-and-wrap loop) and `CryptoSimulator/Simulation.py`'s
//! `Simulation.load` (the caller's side of the same contract: a built-in
//! registry and an agent-template registry passed in, a `(wallet, traders)`
//! pair handed back). The actual tick loop (`Simulation.run`, `market`'s
//! concrete implementation, agent template bodies) is the simulation driver -
//! out of scope here; this module stops at the point where control hands off
//! to it.
use crate::ast::{AgentKind, AstNode};
use crate::dsl::{parse_source, DslError};
use crate::interpreter::{
    self, Environment, EnvKey, Flow, HostObject, NativeCallable, RuntimeError, Value,
};
use crate::semantic::{AgentSubtype, SemanticError, SemanticStaticChecker};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A host-provided agent constructor: `{ subtype_name -> constructor }`
/// registry keyed by agent subtype name. `instantiate` is handed the reduced
/// option map ("OptList reduction") and returns the fresh agent
/// as a `HostObject`, the same way `templateclass(agn.name, **opts)`
/// constructs one in the original.
pub trait AgentTemplate {
    fn instantiate(&self, name: &str, options: HashMap<String, Value>) -> Result<Rc<RefCell<dyn HostObject>>, RuntimeError>;
}

pub type AgentTemplateRegistry = HashMap<String, Box<dyn AgentTemplate>>;
pub type BuiltinRegistry = HashMap<String, Rc<dyn NativeCallable>>;

#[derive(Debug)]
pub enum SimulationError {
    Dsl(DslError),
    Semantic(SemanticError),
    Runtime(RuntimeError),
    UnknownSubtype(String),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Dsl(e) => write!(f, "{}", e),
            SimulationError::Semantic(e) => write!(f, "{}", e),
            SimulationError::Runtime(e) => write!(f, "{}", e),
            SimulationError::UnknownSubtype(s) => write!(f, "no agent template registered for subtype '{}'", s),
        }
    }
}
impl std::error::Error for SimulationError {}

impl From<DslError> for SimulationError {
    fn from(e: DslError) -> Self {
        SimulationError::Dsl(e)
    }
}
impl From<SemanticError> for SimulationError {
    fn from(e: SemanticError) -> Self {
        SimulationError::Semantic(e)
    }
}
impl From<RuntimeError> for SimulationError {
    fn from(e: RuntimeError) -> Self {
        SimulationError::Runtime(e)
    }
}

/// A single wrapped agent: the host object the template constructed, with
/// every declared behavior already installed as a `Value::Native` field
/// under its own name.
pub struct WrappedAgent {
    pub name: String,
    pub instance: Rc<RefCell<dyn HostObject>>,
}

pub struct SimulationResult {
    pub coins: Vec<WrappedAgent>,
    pub traders: Vec<WrappedAgent>,
    /// `name -> reduced option map`, one entry per declared agent, handed
    /// back alongside the wrapped agents themselves: the interpreter
    /// returns `(coin_list, trader_list, option_map)`.
    pub options: HashMap<String, HashMap<String, Value>>,
}

/// A behavior body bound to one agent instance and the shared market, called
/// as an ordinary `NativeCallable` of arity zero - this is the "host-callable
/// closure" that dispatch installs per behavior. Dispatch re-enters the
/// interpreter with a fresh child of the global environment augmented with
/// `MY`/`MARKET`; it is never itself reachable through script-level
/// `my`/`market` injection (`wants_my`/`wants_market` default to `false`).
struct BehaviorClosure {
    body: Rc<Vec<AstNode>>,
    global: Rc<Environment>,
    instance: Rc<RefCell<dyn HostObject>>,
    market: Rc<RefCell<dyn HostObject>>,
}

impl NativeCallable for BehaviorClosure {
    fn arity(&self) -> usize {
        0
    }

    fn call(&self, _args: Vec<Value>, _my: Option<Value>, _market: Option<Value>) -> Result<Value, RuntimeError> {
        crate::log::Log::trace(crate::log::Log::Verbose(()), crate::log::Log::Verbose(()), "dispatching behavior closure");
        let frame = Environment::child(&self.global);
        frame.set_here(EnvKey::My, Value::Host(self.instance.clone()));
        frame.set_here(EnvKey::Market, Value::Host(self.market.clone()));
        match interpreter::exec_block(&self.body, &frame)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break => Ok(Value::Unit),
        }
    }
}

/// Spec §4.6's "OptList reduction": each option's right-hand side is
/// evaluated in a throwaway child frame of `global` (never the frame any
/// behavior later runs in), and a resulting `FunDef` is wrapped into a
/// native callable before it is handed to the agent template - an option
/// can itself be a callback the template stores and calls later.
fn reduce_opt_list(options: &[(String, AstNode)], global: &Rc<Environment>) -> Result<HashMap<String, Value>, RuntimeError> {
    let scratch = Environment::child(global);
    let mut reduced = HashMap::with_capacity(options.len());
    for (name, expr) in options {
        let value = interpreter::eval_expr(expr, &scratch)?;
        let value = interpreter::wrap_script_functions_as_native(vec![value]).into_iter().next().unwrap();
        reduced.insert(name.clone(), value);
    }
    Ok(reduced)
}

fn wrap_agent(
    agent: &AstNode,
    global: &Rc<Environment>,
    agent_templates: &AgentTemplateRegistry,
    market: &Rc<RefCell<dyn HostObject>>,
) -> Result<(AgentKind, WrappedAgent, HashMap<String, Value>), SimulationError> {
    let AstNode::AgentDec { kind, name, subtype, options, behaviors } = agent else {
        panic!("wrap_agent expects an AstNode::AgentDec");
    };
    let template = agent_templates
        .get(subtype)
        .ok_or_else(|| SimulationError::UnknownSubtype(subtype.clone()))?;
    let reduced_options = reduce_opt_list(options, global)?;
    let instance = template.instantiate(name, reduced_options.clone())?;

    for (behavior_name, body) in behaviors {
        let closure = BehaviorClosure {
            body: Rc::new(body.clone()),
            global: global.clone(),
            instance: instance.clone(),
            market: market.clone(),
        };
        instance
            .borrow_mut()
            .set(behavior_name, Value::Native(Rc::new(closure)))?;
    }

    Ok((*kind, WrappedAgent { name: name.clone(), instance }, reduced_options))
}

/// Entry point of the driver contract: parse, run the static checker,
/// then instantiate and wrap every declared agent. `built_ins` seeds the
/// global environment so script bodies (function definitions, behavior
/// bodies, option expressions) can call them; `agent_subtypes` is the same
/// option/behavior membership table the static checker needs -
/// callers typically derive both it and `agent_templates` from one source of
/// truth, but they are kept separate here since the checker only needs names
/// while instantiation needs live constructors.
pub fn interpret_simulation(
    source: &str,
    built_ins: &BuiltinRegistry,
    agent_templates: &AgentTemplateRegistry,
    agent_subtypes: HashMap<String, AgentSubtype>,
    market: Rc<RefCell<dyn HostObject>>,
) -> Result<SimulationResult, SimulationError> {
    let ast = parse_source(source)?;
    let AstNode::Simulation { functions, agents } = &ast else {
        panic!("parse_source must produce an AstNode::Simulation");
    };

    let checker = SemanticStaticChecker::new(built_ins.keys().cloned(), agent_subtypes);
    checker.check(&ast)?;

    let global = Environment::root();
    for (name, native) in built_ins {
        global.set_here(EnvKey::Name(name.clone()), Value::Native(native.clone()));
    }
    interpreter::register_functions(functions, &global);
    global.set_here(EnvKey::Market, Value::Host(market.clone()));

    let mut coins = Vec::new();
    let mut traders = Vec::new();
    let mut reduced_options = HashMap::new();
    for agent in agents {
        let (kind, wrapped, options) = wrap_agent(agent, &global, agent_templates, &market)?;
        reduced_options.insert(wrapped.name.clone(), options);
        match kind {
            AgentKind::Coin => coins.push(wrapped),
            AgentKind::Trader => traders.push(wrapped),
        }
    }

    Ok(SimulationResult { coins, traders, options: reduced_options })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeAgent {
        fields: HashMap<String, Value>,
    }

    impl HostObject for FakeAgent {
        fn get(&self, field: &str) -> Result<Value, RuntimeError> {
            self.fields.get(field).cloned().ok_or_else(|| RuntimeError::UndefinedName(field.to_string()))
        }
        fn set(&mut self, field: &str, value: Value) -> Result<(), RuntimeError> {
            self.fields.insert(field.to_string(), value);
            Ok(())
        }
        fn call_method(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
            let f = self.fields.get(method).cloned().ok_or_else(|| RuntimeError::UndefinedName(method.to_string()))?;
            match f {
                Value::Native(native) => native.call(args, None, None),
                _ => Err(RuntimeError::NotCallable),
            }
        }
    }

    struct FakeTemplate;
    impl AgentTemplate for FakeTemplate {
        fn instantiate(&self, _name: &str, options: HashMap<String, Value>) -> Result<Rc<RefCell<dyn HostObject>>, RuntimeError> {
            Ok(Rc::new(RefCell::new(FakeAgent { fields: options })))
        }
    }

    fn registries() -> (BuiltinRegistry, AgentTemplateRegistry, HashMap<String, AgentSubtype>) {
        let built_ins = BuiltinRegistry::new();
        let mut agent_templates: AgentTemplateRegistry = HashMap::new();
        agent_templates.insert("GenericTrader".to_string(), Box::new(FakeTemplate));
        let mut agent_subtypes = HashMap::new();
        agent_subtypes.insert(
            "GenericTrader".to_string(),
            AgentSubtype { options: ["initial_money".to_string()].into_iter().collect(), behaviors: ["trade".to_string()].into_iter().collect() },
        );
        (built_ins, agent_templates, agent_subtypes)
    }

    #[test]
    fn wraps_a_trader_with_its_options_and_behavior_installed() {
        let (built_ins, agent_templates, agent_subtypes) = registries();
        let market: Rc<RefCell<dyn HostObject>> = Rc::new(RefCell::new(FakeAgent::default()));
        let source = "trader T : GenericTrader [initial_money = 100] { trade { ret 1; } }";
        let result = interpret_simulation(source, &built_ins, &agent_templates, agent_subtypes, market).unwrap();

        assert_eq!(result.traders.len(), 1);
        assert!(result.coins.is_empty());
        let trader = &result.traders[0];
        assert_eq!(trader.name, "T");
        match result.options.get("T").unwrap().get("initial_money").unwrap() {
            Value::Int(100) => {}
            other => panic!("expected Int(100), found {:?}", other),
        }

        let trade = trader.instance.borrow().get("trade").unwrap();
        let Value::Native(native) = trade else { panic!("trade should be installed as a native closure") };
        let v = native.call(vec![], None, None).unwrap();
        match v {
            Value::Int(1) => {}
            other => panic!("expected Int(1), found {:?}", other),
        }
    }

    #[test]
    fn unregistered_subtype_is_a_simulation_error() {
        let (built_ins, agent_templates, agent_subtypes) = registries();
        let market: Rc<RefCell<dyn HostObject>> = Rc::new(RefCell::new(FakeAgent::default()));
        let source = "coin C : Nonexistent [a = 1] { tick { ret 1; } }";
        let err = interpret_simulation(source, &built_ins, &agent_templates, agent_subtypes, market).unwrap_err();
        assert!(matches!(err, SimulationError::Semantic(_)));
    }
}
