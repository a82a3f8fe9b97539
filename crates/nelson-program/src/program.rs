//! The `Program` type and its combinators.
//!
//! Sequencing obeys the usual laws, observed through interpretation:
//!
//! - `Program::pure(v).and_then(f)` behaves as `f(v)`
//! - `p.and_then(Program::pure)` behaves as `p`
//! - `p.and_then(f).and_then(g)` behaves as `p.and_then(|x| f(x).and_then(g))`
//!
//! Once a program reaches a failure, nothing sequenced after it runs.
//!
//! A program is a head (a value, one pending instruction, or a failure)
//! plus a flat queue of continuations. `and_then` appends to the queue, so
//! binds never nest however the program was built, and [`Program::step`]
//! reaches the next instruction without recursion.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;

use crate::error::WorkflowError;
use crate::op::Op;
use crate::outcome::{FromOutcome, Outcome};

/// An intermediate value whose type is fixed by the continuation that reads it.
type Value = Box<dyn Any + Send>;

/// Decodes an instruction's outcome.
type Resume = Box<dyn FnOnce(Outcome) -> Head + Send>;

/// One queued `and_then`.
type Kont = Box<dyn FnOnce(Value) -> Raw + Send>;

enum Head {
    Done(Value),
    Pending(Op, Resume),
    Failed(WorkflowError),
}

struct Raw {
    head: Head,
    queue: VecDeque<Kont>,
}

impl Raw {
    fn new(head: Head) -> Self {
        Self {
            head,
            queue: VecDeque::new(),
        }
    }
}

/// Put `front` ahead of everything already in `queue`, moving the shorter side.
fn splice(queue: &mut VecDeque<Kont>, mut front: VecDeque<Kont>) {
    if front.is_empty() {
        return;
    }
    if front.len() >= queue.len() {
        front.append(queue);
        *queue = front;
    } else {
        while let Some(k) = front.pop_back() {
            queue.push_front(k);
        }
    }
}

fn unerase<T: 'static>(value: Value) -> Result<T, WorkflowError> {
    value
        .downcast::<T>()
        .map(|v| *v)
        .map_err(|_| WorkflowError::UnexpectedOutcome {
            op: "program.value",
            outcome: std::any::type_name::<T>(),
        })
}

/// A not-yet-executed description of work that yields a `T`.
pub struct Program<T> {
    raw: Raw,
    _out: PhantomData<fn() -> T>,
}

/// Where a program stands once every pure continuation up to the next
/// instruction has run.
pub enum Step<T> {
    /// Finished with a value.
    Done(T),
    /// Perform `Op`, then [`Suspended::resume`] with its outcome.
    Instruction(Op, Suspended<T>),
    /// Finished with a failure.
    Failed(WorkflowError),
}

/// The rest of a program, waiting for one instruction's outcome.
pub struct Suspended<T> {
    resume: Resume,
    queue: VecDeque<Kont>,
    _out: PhantomData<fn() -> T>,
}

impl<T: 'static> Suspended<T> {
    pub fn resume(self, outcome: Outcome) -> Program<T> {
        Program::from_raw(Raw {
            head: (self.resume)(outcome),
            queue: self.queue,
        })
    }
}

impl<T: 'static> Program<T> {
    fn from_raw(raw: Raw) -> Self {
        Self {
            raw,
            _out: PhantomData,
        }
    }

    /// Run queued continuations until the program needs an instruction
    /// performed, or ends.
    pub fn step(self) -> Step<T> {
        let Raw { mut head, mut queue } = self.raw;
        loop {
            match head {
                Head::Failed(err) => return Step::Failed(err),
                Head::Pending(op, resume) => {
                    return Step::Instruction(
                        op,
                        Suspended {
                            resume,
                            queue,
                            _out: PhantomData,
                        },
                    );
                }
                Head::Done(value) => match queue.pop_front() {
                    Some(k) => {
                        let next = k(value);
                        head = next.head;
                        splice(&mut queue, next.queue);
                    }
                    None => {
                        return match unerase(value) {
                            Ok(value) => Step::Done(value),
                            Err(err) => Step::Failed(err),
                        };
                    }
                },
            }
        }
    }

    /// Drive the program to completion with a synchronous handler.
    ///
    /// The handler is called once per instruction, in order; the first
    /// error it returns ends the run.
    pub fn run_with<F>(self, mut handler: F) -> Result<T, WorkflowError>
    where
        F: FnMut(&Op) -> Result<Outcome, WorkflowError>,
    {
        let mut program = self;
        loop {
            match program.step() {
                Step::Done(value) => return Ok(value),
                Step::Failed(err) => return Err(err),
                Step::Instruction(op, rest) => {
                    let outcome = handler(&op)?;
                    program = rest.resume(outcome);
                }
            }
        }
    }
}

impl<T: Send + 'static> Program<T> {
    /// Lift a value with no side effect.
    pub fn pure(value: T) -> Self {
        Self::from_raw(Raw::new(Head::Done(Box::new(value))))
    }

    /// Abort with a descriptive message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::failed(WorkflowError::Failed(message.into()))
    }

    pub fn failed(err: WorkflowError) -> Self {
        Self::from_raw(Raw::new(Head::Failed(err)))
    }

    /// A single instruction whose outcome is read back as a `T`.
    pub fn instruction(op: Op) -> Self
    where
        T: FromOutcome,
    {
        let name = op.name();
        let resume: Resume = Box::new(move |outcome| match T::from_outcome(outcome) {
            Ok(value) => Head::Done(Box::new(value)),
            Err(other) => Head::Failed(WorkflowError::UnexpectedOutcome {
                op: name,
                outcome: other.kind(),
            }),
        });
        Self::from_raw(Raw::new(Head::Pending(op, resume)))
    }

    /// Run `self`, then feed its value to `f` and run the result.
    pub fn and_then<U, F>(self, f: F) -> Program<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Program<U> + Send + 'static,
    {
        let mut raw = self.raw;
        if !matches!(raw.head, Head::Failed(_)) {
            raw.queue.push_back(Box::new(move |value| match unerase::<T>(value) {
                Ok(value) => f(value).raw,
                Err(err) => Raw::new(Head::Failed(err)),
            }));
        }
        Program::from_raw(raw)
    }

    pub fn map<U, F>(self, f: F) -> Program<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.and_then(move |value| Program::pure(f(value)))
    }

    /// Run `self`, discard its value, then run `next`.
    pub fn then<U>(self, next: Program<U>) -> Program<U>
    where
        U: Send + 'static,
    {
        self.and_then(move |_| next)
    }

    /// Discard the value.
    pub fn void(self) -> Program<()> {
        self.map(|_| ())
    }

    /// Wrap the value in `Some`, entering optional short-circuiting.
    pub fn some(self) -> Program<Option<T>> {
        self.map(Some)
    }

    /// Run every program in order, collecting their values.
    pub fn sequence(programs: Vec<Program<T>>) -> Program<Vec<T>> {
        let capacity = programs.len();
        programs
            .into_iter()
            .fold(Program::pure(Vec::with_capacity(capacity)), |acc, program| {
                acc.and_then(move |mut values| {
                    program.map(move |value| {
                        values.push(value);
                        values
                    })
                })
            })
    }
}

impl Program<()> {
    /// `program` if `condition` holds, otherwise nothing.
    pub fn when(condition: bool, program: Program<()>) -> Program<()> {
        if condition { program } else { Program::pure(()) }
    }

    /// One program per item, run in order.
    pub fn for_each<I, F>(items: I, f: F) -> Program<()>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Program<()>,
    {
        items
            .into_iter()
            .map(f)
            .fold(Program::pure(()), |acc, program| acc.then(program))
    }
}

impl<T: Send + 'static> Program<Option<T>> {
    /// Continue with `f` only when a value is present; `None` ends the
    /// chain successfully with nothing done.
    pub fn and_then_some<U, F>(self, f: F) -> Program<Option<U>>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Program<Option<U>> + Send + 'static,
    {
        self.and_then(move |value| match value {
            Some(v) => f(v),
            None => Program::pure(None),
        })
    }

    /// Lift an optional value into the chain.
    pub fn lift_some(value: Option<T>) -> Self {
        Program::pure(value)
    }
}

impl<T> fmt::Debug for Program<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Program");
        match &self.raw.head {
            Head::Done(_) => out.field("head", &"done"),
            Head::Pending(op, _) => out.field("head", op),
            Head::Failed(err) => out.field("head", err),
        };
        out.field("queued", &self.raw.queue.len()).finish()
    }
}

impl<T> fmt::Debug for Step<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Done(_) => f.write_str("Done(..)"),
            Step::Instruction(op, _) => f.debug_tuple("Instruction").field(op).finish(),
            Step::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}
