//! End-to-end exercise of the driver contract: a minimal in-test
//! `AgentTemplate`/`HostObject`/market stand-in plus a handful of native
//! callables modeled on `examples/original_source/CryptoSimulator/
//! library_built_in/sim_ops.py` (`buy`, `sell`, `leave`, `say`, `dummy`),
//! driving `simulation::interpret_simulation` followed by a hand-rolled tick
//! loop - the shape `CryptoSimulator/Simulation.py`'s `Simulation.load`/`run`
//! take, without reimplementing the driver itself (out of scope here).
use cryptosim_lang::interpreter::{HostObject, NativeCallable, RuntimeError, Value};
use cryptosim_lang::semantic::AgentSubtype;
use cryptosim_lang::simulation::{interpret_simulation, AgentTemplate, AgentTemplateRegistry, BuiltinRegistry};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Default)]
struct FakeMarket {
    time: i64,
    end_time: i64,
    verbose: i64,
    log: Vec<String>,
    /// stand-in for spec §6's `market.leaved` set: the names of every trader
    /// that has called `leave()` so far.
    leaved: Vec<String>,
}

impl HostObject for FakeMarket {
    fn get(&self, field: &str) -> Result<Value, RuntimeError> {
        match field {
            "time" => Ok(Value::Int(self.time)),
            "end_time" => Ok(Value::Int(self.end_time)),
            "verbose" => Ok(Value::Int(self.verbose)),
            other => Err(RuntimeError::UndefinedName(other.to_string())),
        }
    }
    fn set(&mut self, field: &str, value: Value) -> Result<(), RuntimeError> {
        match (field, value) {
            ("time", Value::Int(t)) => {
                self.time = t;
                Ok(())
            }
            ("verbose", Value::Int(v)) => {
                self.verbose = v;
                Ok(())
            }
            _ => Err(RuntimeError::InvalidAssignTarget),
        }
    }
    fn call_method(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match method {
            "record_leave" => {
                let Some(Value::Str(name)) = args.into_iter().next() else {
                    return Err(RuntimeError::TypeMismatch("record_leave expects a string name".to_string()));
                };
                self.leaved.push(name);
                Ok(Value::Unit)
            }
            other => Err(RuntimeError::UndefinedName(other.to_string())),
        }
    }
}

#[derive(Default)]
struct FakeTrader {
    name: String,
    money: i64,
    wallet: i64,
    fields: HashMap<String, Value>,
}

impl HostObject for FakeTrader {
    fn get(&self, field: &str) -> Result<Value, RuntimeError> {
        match field {
            "name" => Ok(Value::Str(self.name.clone())),
            "money" => Ok(Value::Int(self.money)),
            "wallet" => Ok(Value::Int(self.wallet)),
            other => self.fields.get(other).cloned().ok_or_else(|| RuntimeError::UndefinedName(other.to_string())),
        }
    }
    fn set(&mut self, field: &str, value: Value) -> Result<(), RuntimeError> {
        match (field, value) {
            ("money", Value::Int(n)) => {
                self.money = n;
                Ok(())
            }
            (other, v) => {
                self.fields.insert(other.to_string(), v);
                Ok(())
            }
        }
    }
    fn call_method(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let f = self.fields.get(method).cloned().ok_or_else(|| RuntimeError::UndefinedName(method.to_string()))?;
        match f {
            Value::Native(native) => native.call(args, None, None),
            _ => Err(RuntimeError::NotCallable),
        }
    }
}

struct TraderTemplate;
impl AgentTemplate for TraderTemplate {
    fn instantiate(&self, name: &str, options: HashMap<String, Value>) -> Result<Rc<RefCell<dyn HostObject>>, RuntimeError> {
        let money = match options.get("initial_money") {
            Some(Value::Int(n)) => *n,
            _ => 0,
        };
        Ok(Rc::new(RefCell::new(FakeTrader { name: name.to_string(), money, wallet: 0, fields: HashMap::new() })))
    }
}

/// `buy(coin, amount)` simplified: moves `amount` from `my.money` into
/// `my.wallet`, needs both reserved keyword arguments injected (`sim_ops.py`'s
/// `buy(coin, amount=None, *, my, market)`).
struct Buy;
impl NativeCallable for Buy {
    fn arity(&self) -> usize {
        1
    }
    fn wants_my(&self) -> bool {
        true
    }
    fn wants_market(&self) -> bool {
        true
    }
    fn call(&self, args: Vec<Value>, my: Option<Value>, _market: Option<Value>) -> Result<Value, RuntimeError> {
        let Some(Value::Int(amount)) = args.into_iter().next() else {
            return Err(RuntimeError::TypeMismatch("buy expects an int amount".to_string()));
        };
        let Some(Value::Host(trader)) = my else { return Err(RuntimeError::MissingContext("my")) };
        let money = trader.borrow().get("money")?;
        let Value::Int(money) = money else { return Err(RuntimeError::TypeMismatch("money must be an int".to_string())) };
        trader.borrow_mut().set("money", Value::Int(money - amount))?;
        let wallet = trader.borrow().get("wallet")?;
        let Value::Int(wallet) = wallet else { return Err(RuntimeError::TypeMismatch("wallet must be an int".to_string())) };
        trader.borrow_mut().set("wallet", Value::Int(wallet + amount))?;
        Ok(Value::Unit)
    }
}

/// `say(msg)` needs neither reserved keyword argument - a plain native call.
struct Say {
    log: Rc<RefCell<Vec<String>>>,
}
impl NativeCallable for Say {
    fn arity(&self) -> usize {
        1
    }
    fn call(&self, args: Vec<Value>, _my: Option<Value>, _market: Option<Value>) -> Result<Value, RuntimeError> {
        let Some(Value::Str(msg)) = args.into_iter().next() else {
            return Err(RuntimeError::TypeMismatch("say expects a string".to_string()));
        };
        self.log.borrow_mut().push(msg);
        Ok(Value::Unit)
    }
}

/// `sell(coin, amount)` simplified: the reverse of `Buy`, moves `amount` from
/// `my.wallet` back into `my.money`.
struct Sell;
impl NativeCallable for Sell {
    fn arity(&self) -> usize {
        1
    }
    fn wants_my(&self) -> bool {
        true
    }
    fn wants_market(&self) -> bool {
        true
    }
    fn call(&self, args: Vec<Value>, my: Option<Value>, _market: Option<Value>) -> Result<Value, RuntimeError> {
        let Some(Value::Int(amount)) = args.into_iter().next() else {
            return Err(RuntimeError::TypeMismatch("sell expects an int amount".to_string()));
        };
        let Some(Value::Host(trader)) = my else { return Err(RuntimeError::MissingContext("my")) };
        let wallet = trader.borrow().get("wallet")?;
        let Value::Int(wallet) = wallet else { return Err(RuntimeError::TypeMismatch("wallet must be an int".to_string())) };
        trader.borrow_mut().set("wallet", Value::Int(wallet - amount))?;
        let money = trader.borrow().get("money")?;
        let Value::Int(money) = money else { return Err(RuntimeError::TypeMismatch("money must be an int".to_string())) };
        trader.borrow_mut().set("money", Value::Int(money + amount))?;
        Ok(Value::Unit)
    }
}

/// `leave()` stands in for `sim_ops.py`'s `leave(*, my, market)`: records the
/// calling trader's name on the market and raises the return carrier so the
/// enclosing behavior stops right there, the way a bare `ret;` would.
struct Leave;
impl NativeCallable for Leave {
    fn arity(&self) -> usize {
        0
    }
    fn wants_my(&self) -> bool {
        true
    }
    fn wants_market(&self) -> bool {
        true
    }
    fn call(&self, _args: Vec<Value>, my: Option<Value>, market: Option<Value>) -> Result<Value, RuntimeError> {
        let Some(Value::Host(trader)) = my else { return Err(RuntimeError::MissingContext("my")) };
        let Some(Value::Host(market)) = market else { return Err(RuntimeError::MissingContext("market")) };
        let name = trader.borrow().get("name")?;
        market.borrow_mut().call_method("record_leave", vec![name])?;
        Err(RuntimeError::NonLocalReturn)
    }
}

/// Spec §8 scenario 5: a managed script function passed as an argument to a
/// native callable, invoked from inside that native with evaluated arguments.
struct Dummy;
impl NativeCallable for Dummy {
    fn arity(&self) -> usize {
        1
    }
    fn call(&self, args: Vec<Value>, _my: Option<Value>, _market: Option<Value>) -> Result<Value, RuntimeError> {
        let Some(Value::Native(func)) = args.into_iter().next() else {
            return Err(RuntimeError::TypeMismatch("dummy expects a callable".to_string()));
        };
        func.call(vec![Value::Int(5), Value::Int(6)], None, None)
    }
}

fn registries(log: Rc<RefCell<Vec<String>>>) -> (BuiltinRegistry, AgentTemplateRegistry, HashMap<String, AgentSubtype>) {
    let mut built_ins: BuiltinRegistry = HashMap::new();
    built_ins.insert("buy".to_string(), Rc::new(Buy));
    built_ins.insert("sell".to_string(), Rc::new(Sell));
    built_ins.insert("leave".to_string(), Rc::new(Leave));
    built_ins.insert("say".to_string(), Rc::new(Say { log }));
    built_ins.insert("dummy".to_string(), Rc::new(Dummy));

    let mut agent_templates: AgentTemplateRegistry = HashMap::new();
    agent_templates.insert("GenericTrader".to_string(), Box::new(TraderTemplate));

    let mut agent_subtypes = HashMap::new();
    agent_subtypes.insert(
        "GenericTrader".to_string(),
        AgentSubtype {
            options: ["initial_money".to_string()].into_iter().collect(),
            behaviors: ["trade".to_string()].into_iter().collect(),
        },
    );
    (built_ins, agent_templates, agent_subtypes)
}

#[test]
fn wrapped_trader_buys_on_every_tick_and_reaches_the_injected_market() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let (built_ins, agent_templates, agent_subtypes) = registries(log.clone());
    let market: Rc<RefCell<dyn HostObject>> = Rc::new(RefCell::new(FakeMarket { end_time: 3, ..Default::default() }));

    let source = "trader T : GenericTrader [initial_money = 100] { trade { say('ticking'); buy(10); } }";
    let result = interpret_simulation(source, &built_ins, &agent_templates, agent_subtypes, market.clone()).unwrap();

    assert_eq!(result.traders.len(), 1);
    let trader = &result.traders[0];

    // hand-rolled tick loop standing in for the out-of-scope driver:
    // invoke `trade` once per tick until `market.time >= market.end_time`.
    loop {
        let current = market.borrow().get("time").unwrap();
        let Value::Int(t) = current else { panic!() };
        let Value::Int(end) = market.borrow().get("end_time").unwrap() else { panic!() };
        if t >= end {
            break;
        }
        trader.instance.borrow_mut().call_method("trade", vec![]).unwrap();
        market.borrow_mut().set("time", Value::Int(t + 1)).unwrap();
    }

    assert_eq!(log.borrow().as_slice(), &["ticking", "ticking", "ticking"]);
    match trader.instance.borrow().get("money").unwrap() {
        Value::Int(70) => {}
        other => panic!("expected Int(70), found {:?}", other),
    }
    match trader.instance.borrow().get("wallet").unwrap() {
        Value::Int(30) => {}
        other => panic!("expected Int(30), found {:?}", other),
    }
}

#[test]
fn a_native_callable_can_invoke_a_script_function_passed_as_its_argument() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let (built_ins, agent_templates, agent_subtypes) = registries(log);
    let market: Rc<RefCell<dyn HostObject>> = Rc::new(RefCell::new(FakeMarket::default()));

    let source = "func add(a, b) { ret a + b; } trader T : GenericTrader [initial_money = 0] { trade { dummy(add); } }";
    let result = interpret_simulation(source, &built_ins, &agent_templates, agent_subtypes, market).unwrap();
    let trader = &result.traders[0];
    let v = trader.instance.borrow_mut().call_method("trade", vec![]).unwrap();
    match v {
        Value::Int(11) => {}
        other => panic!("expected Int(11), found {:?}", other),
    }
}

/// Spec §8 scenario 6: `leave()` inside a behavior must stop execution right
/// there - the `say('unreachable')` after it must never run - and the market
/// must observe that the trader left.
#[test]
fn leave_stops_the_behavior_and_is_recorded_on_the_market() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let (built_ins, agent_templates, agent_subtypes) = registries(log.clone());
    let market_concrete = Rc::new(RefCell::new(FakeMarket::default()));
    let market: Rc<RefCell<dyn HostObject>> = market_concrete.clone();

    let source = "trader T : GenericTrader [initial_money = 100] { \
        trade { sell(5); leave(); say('unreachable'); } }";
    let result = interpret_simulation(source, &built_ins, &agent_templates, agent_subtypes, market).unwrap();
    let trader = &result.traders[0];

    let v = trader.instance.borrow_mut().call_method("trade", vec![]).unwrap();
    assert!(matches!(v, Value::Unit));
    assert!(log.borrow().is_empty(), "say('unreachable') must never run after leave()");
    assert_eq!(market_concrete.borrow().leaved, vec!["T".to_string()]);
    match trader.instance.borrow().get("money").unwrap() {
        Value::Int(105) => {}
        other => panic!("expected Int(105) after sell(5), found {:?}", other),
    }
}
