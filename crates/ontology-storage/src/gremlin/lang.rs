//! A small Gremlin traversal builder
//!
//! Traversals are kept as a list of [`Step`]s and only turned into script
//! text by [`Traversal::render`]. Every caller-supplied value becomes a bound
//! parameter; only labels, property keys and integers are written inline.

use serde_json::Value;

/// Parameter bindings sent alongside a script
pub type Bindings = serde_json::Map<String, Value>;

/// Where a traversal starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// `g`, the graph traversal source
    Graph,
    /// `__`, an anonymous child traversal
    Anonymous,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Value),
    Neq(Value),
    Within(Vec<Value>),
}

impl Predicate {
    pub fn within<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self::Within(values.into_iter().map(Into::into).collect())
    }

    /// Does `value` satisfy the predicate
    pub fn test(&self, value: &Value) -> bool {
        match self {
            Self::Eq(expected) => value == expected,
            Self::Neq(expected) => value != expected,
            Self::Within(set) => set.contains(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    V,
    E,
    HasLabel(String),
    Has(String, Predicate),
    /// Element has the property at all
    HasKey(String),
    OutE(String),
    InE(String),
    BothE(String),
    InV,
    OutV,
    Repeat(Traversal),
    Emit,
    Times(u32),
    Path,
    Unfold,
    Fold,
    Dedup,
    Values(String),
    Order,
    By(String, Order),
    /// `high` of `None` runs to the end
    Range(usize, Option<usize>),
    Count,
    AddV(String),
    AddE(String),
    To(Traversal),
    Property {
        key: String,
        value: Value,
        single: bool,
    },
    Coalesce(Vec<Traversal>),
    Drop,
    Iterate,
}

/// A Gremlin traversal under construction
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    source: Source,
    steps: Vec<Step>,
}

/// `g`
pub fn g() -> Traversal {
    Traversal::new(Source::Graph)
}

/// `__`
pub fn anon() -> Traversal {
    Traversal::new(Source::Anonymous)
}

impl Traversal {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            steps: Vec::new(),
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn v(self) -> Self {
        self.step(Step::V)
    }

    pub fn e(self) -> Self {
        self.step(Step::E)
    }

    pub fn has_label(self, label: &str) -> Self {
        self.step(Step::HasLabel(label.to_string()))
    }

    pub fn has(self, key: &str, predicate: Predicate) -> Self {
        self.step(Step::Has(key.to_string(), predicate))
    }

    pub fn has_eq(self, key: &str, value: impl Into<Value>) -> Self {
        self.has(key, Predicate::Eq(value.into()))
    }

    pub fn has_key(self, key: &str) -> Self {
        self.step(Step::HasKey(key.to_string()))
    }

    pub fn out_e(self, label: &str) -> Self {
        self.step(Step::OutE(label.to_string()))
    }

    pub fn in_e(self, label: &str) -> Self {
        self.step(Step::InE(label.to_string()))
    }

    pub fn both_e(self, label: &str) -> Self {
        self.step(Step::BothE(label.to_string()))
    }

    pub fn in_v(self) -> Self {
        self.step(Step::InV)
    }

    pub fn out_v(self) -> Self {
        self.step(Step::OutV)
    }

    pub fn repeat(self, body: Traversal) -> Self {
        self.step(Step::Repeat(body))
    }

    pub fn emit(self) -> Self {
        self.step(Step::Emit)
    }

    pub fn times(self, n: u32) -> Self {
        self.step(Step::Times(n))
    }

    pub fn path(self) -> Self {
        self.step(Step::Path)
    }

    pub fn unfold(self) -> Self {
        self.step(Step::Unfold)
    }

    pub fn fold(self) -> Self {
        self.step(Step::Fold)
    }

    pub fn dedup(self) -> Self {
        self.step(Step::Dedup)
    }

    pub fn values(self, key: &str) -> Self {
        self.step(Step::Values(key.to_string()))
    }

    pub fn order(self) -> Self {
        self.step(Step::Order)
    }

    pub fn by(self, key: &str, order: Order) -> Self {
        self.step(Step::By(key.to_string(), order))
    }

    pub fn range(self, low: usize, high: Option<usize>) -> Self {
        self.step(Step::Range(low, high))
    }

    pub fn count(self) -> Self {
        self.step(Step::Count)
    }

    pub fn add_v(self, label: &str) -> Self {
        self.step(Step::AddV(label.to_string()))
    }

    pub fn add_e(self, label: &str) -> Self {
        self.step(Step::AddE(label.to_string()))
    }

    pub fn to(self, target: Traversal) -> Self {
        self.step(Step::To(target))
    }

    pub fn property(self, key: &str, value: impl Into<Value>) -> Self {
        self.step(Step::Property {
            key: key.to_string(),
            value: value.into(),
            single: false,
        })
    }

    /// Vertex property with single cardinality, replacing any previous value
    pub fn property_single(self, key: &str, value: impl Into<Value>) -> Self {
        self.step(Step::Property {
            key: key.to_string(),
            value: value.into(),
            single: true,
        })
    }

    pub fn coalesce(self, options: Vec<Traversal>) -> Self {
        self.step(Step::Coalesce(options))
    }

    pub fn drop_elements(self) -> Self {
        self.step(Step::Drop)
    }

    pub fn iterate(self) -> Self {
        self.step(Step::Iterate)
    }

    /// Render to script text, binding values into `bindings`
    pub fn render(&self, bindings: &mut Bindings) -> String {
        let mut out = String::from(match self.source {
            Source::Graph => "g",
            Source::Anonymous => "__",
        });

        for step in &self.steps {
            out.push('.');
            out.push_str(&render_step(step, bindings));
        }
        out
    }
}

fn bind(bindings: &mut Bindings, value: Value) -> String {
    let name = format!("p{}", bindings.len());
    bindings.insert(name.clone(), value);
    name
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn render_predicate(predicate: &Predicate, bindings: &mut Bindings) -> String {
    match predicate {
        Predicate::Eq(v) => bind(bindings, v.clone()),
        Predicate::Neq(v) => format!("neq({})", bind(bindings, v.clone())),
        Predicate::Within(vs) => format!("within({})", bind(bindings, Value::Array(vs.clone()))),
    }
}

fn render_step(step: &Step, bindings: &mut Bindings) -> String {
    match step {
        Step::V => "V()".to_string(),
        Step::E => "E()".to_string(),
        Step::HasLabel(label) => format!("hasLabel({})", quote(label)),
        Step::Has(key, predicate) => {
            let p = render_predicate(predicate, bindings);
            format!("has({},{})", quote(key), p)
        }
        Step::HasKey(key) => format!("has({})", quote(key)),
        Step::OutE(label) => format!("outE({})", quote(label)),
        Step::InE(label) => format!("inE({})", quote(label)),
        Step::BothE(label) => format!("bothE({})", quote(label)),
        Step::InV => "inV()".to_string(),
        Step::OutV => "outV()".to_string(),
        Step::Repeat(body) => {
            let inner = body.render(bindings);
            format!("repeat({})", inner)
        }
        Step::Emit => "emit()".to_string(),
        Step::Times(n) => format!("times({})", n),
        Step::Path => "path()".to_string(),
        Step::Unfold => "unfold()".to_string(),
        Step::Fold => "fold()".to_string(),
        Step::Dedup => "dedup()".to_string(),
        Step::Values(key) => format!("values({})", quote(key)),
        Step::Order => "order()".to_string(),
        Step::By(key, order) => {
            let order = match order {
                Order::Asc => "asc",
                Order::Desc => "desc",
            };
            format!("by({},{})", quote(key), order)
        }
        Step::Range(low, high) => match high {
            Some(high) => format!("range({},{})", low, high),
            None => format!("range({},-1)", low),
        },
        Step::Count => "count()".to_string(),
        Step::AddV(label) => format!("addV({})", quote(label)),
        Step::AddE(label) => format!("addE({})", quote(label)),
        Step::To(target) => {
            let inner = target.render(bindings);
            format!("to({})", inner)
        }
        Step::Property { key, value, single } => {
            let p = bind(bindings, value.clone());
            if *single {
                format!("property(single,{},{})", quote(key), p)
            } else {
                format!("property({},{})", quote(key), p)
            }
        }
        Step::Coalesce(options) => {
            let inner: Vec<String> = options.iter().map(|t| t.render(bindings)).collect();
            format!("coalesce({})", inner.join(","))
        }
        Step::Drop => "drop()".to_string(),
        Step::Iterate => "iterate()".to_string(),
    }
}
