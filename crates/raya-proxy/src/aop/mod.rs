//! Aspect primitives: pointcuts, advice, advisors and join points

mod advice;
mod join_point;
mod pointcut;

pub use advice::{Advice, AdviceKind, Advisor, AfterReturningFn, AroundFn, BeforeFn};
pub use join_point::{JoinPoint, JoinPointAdapter, MethodSignature};
pub use pointcut::{DecoratorPointcut, FnPointcut, MethodNamePointcut, Pointcut};
