//! Join points and the per-method interception adapter
//!
//! A [`JoinPointAdapter`] binds one around-advice to one overridden method.
//! Every call on the proxy builds a fresh [`JoinPoint`] carrying the
//! receiver, the signature, the arguments and a continuation to the original
//! body. The original body always runs with the proxy as its receiver, so
//! calls it makes on `self` go back through the proxy's vtable.

use std::fmt;
use std::sync::Arc;

use crate::error::{InvocationError, InvocationResult};
use crate::model::{check_arguments, Class, ClassId, MethodFn, MethodInfo, Object, ParameterInfo, TypeInfo, Value};

use super::AroundFn;

/// Signature of an intercepted method
#[derive(Debug, Clone)]
pub struct MethodSignature {
    /// Method name
    pub name: String,
    /// Class that declares the method
    pub declaring_class: ClassId,
    /// Declaring class name
    pub declaring_class_name: String,
    /// Parameters in declaration order
    pub parameters: Vec<ParameterInfo>,
    /// Return type
    pub return_type: TypeInfo,
}

impl MethodSignature {
    /// Build from method metadata
    pub fn from_method(method: &MethodInfo, class: &Class) -> Self {
        Self {
            name: method.name.clone(),
            declaring_class: method.declaring_class,
            declaring_class_name: class.name().to_string(),
            parameters: method.parameters.clone(),
            return_type: method.return_type.clone(),
        }
    }

    /// Parameter types in declaration order
    pub fn parameter_types(&self) -> Vec<TypeInfo> {
        self.parameters.iter().map(|p| p.type_info.clone()).collect()
    }

    /// Parameter names in declaration order
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// `Signature(name=..., parameters=[...])`
    pub fn to_short_string(&self) -> String {
        format!(
            "Signature(name={}, parameters={:?})",
            self.name,
            self.parameter_names()
        )
    }
}

/// Context of one intercepted call
pub struct JoinPoint {
    receiver: Object,
    signature: Arc<MethodSignature>,
    args: Vec<Value>,
    original: MethodFn,
}

impl JoinPoint {
    pub(crate) fn new(
        receiver: Object,
        signature: Arc<MethodSignature>,
        args: Vec<Value>,
        original: MethodFn,
    ) -> Self {
        Self {
            receiver,
            signature,
            args,
            original,
        }
    }

    /// The proxy instance the call was made on
    pub fn this(&self) -> &Object {
        &self.receiver
    }

    /// Signature of the intercepted method
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Arguments the call received
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Run the original body with the original arguments
    pub fn proceed(&self) -> InvocationResult<Value> {
        (self.original)(&self.receiver, &self.args)
    }

    /// Run the original body with replacement arguments
    ///
    /// Arguments must match the parameter count and be assignable to the
    /// parameter types.
    pub fn proceed_with(&self, args: Vec<Value>) -> InvocationResult<Value> {
        check_arguments(&self.signature.parameters, &args).map_err(|reason| {
            InvocationError::IllegalArgument {
                method: self.signature.name.clone(),
                reason,
            }
        })?;
        (self.original)(&self.receiver, &args)
    }

    /// `JoinPoint(target=...)`
    pub fn to_short_string(&self) -> String {
        format!("JoinPoint(target={})", self.signature.name)
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("receiver", &self.receiver.id())
            .field("signature", &self.signature.to_short_string())
            .field("args", &self.args)
            .finish()
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_short_string())
    }
}

/// Binds one around-advice to one overridden method
#[derive(Clone)]
pub struct JoinPointAdapter {
    advice: AroundFn,
    signature: Arc<MethodSignature>,
    original: MethodFn,
}

impl JoinPointAdapter {
    /// Bind `advice` in front of `original`
    pub fn new(advice: AroundFn, signature: Arc<MethodSignature>, original: MethodFn) -> Self {
        Self {
            advice,
            signature,
            original,
        }
    }

    /// Handle one call: build the join point and hand it to the advice
    pub fn invoke(&self, receiver: &Object, args: &[Value]) -> InvocationResult<Value> {
        let join_point = JoinPoint::new(
            receiver.clone(),
            Arc::clone(&self.signature),
            args.to_vec(),
            Arc::clone(&self.original),
        );
        (self.advice)(&join_point)
    }

    /// Turn the adapter into a vtable entry
    pub fn into_method(self) -> MethodFn {
        Arc::new(move |receiver, args| self.invoke(receiver, args))
    }
}

impl fmt::Debug for JoinPointAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPointAdapter")
            .field("signature", &self.signature.to_short_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassBuilder, MethodDefinition};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn adder() -> Arc<Class> {
        ClassBuilder::new("Adder")
            .method(
                MethodDefinition::new("add", |_, args| {
                    let a = args[0].as_int().unwrap_or(0);
                    let b = args[1].as_int().unwrap_or(0);
                    Ok(Value::from(a + b))
                })
                .param("a", TypeInfo::int())
                .param("b", TypeInfo::int())
                .returns(TypeInfo::int()),
            )
            .build()
    }

    fn adapter_for(class: &Arc<Class>, advice: AroundFn) -> JoinPointAdapter {
        let method = class.method("add").unwrap();
        let original = Arc::clone(class.vtable().get(method.slot).unwrap());
        JoinPointAdapter::new(
            advice,
            Arc::new(MethodSignature::from_method(method, class)),
            original,
        )
    }

    #[test]
    fn test_proceed_matches_direct_call() {
        let class = adder();
        let obj = Object::allocate(&class);
        let adapter = adapter_for(&class, Arc::new(|jp: &JoinPoint| jp.proceed()));

        let args = [Value::from(2), Value::from(3)];
        assert_eq!(
            adapter.invoke(&obj, &args).unwrap(),
            obj.invoke("add", &args).unwrap()
        );
    }

    #[test]
    fn test_proceed_with_substituted_args() {
        let class = adder();
        let obj = Object::allocate(&class);
        let adapter = adapter_for(
            &class,
            Arc::new(|jp: &JoinPoint| jp.proceed_with(vec![Value::from(10), Value::from(20)])),
        );

        assert_eq!(
            adapter.invoke(&obj, &[Value::from(1), Value::from(1)]).unwrap(),
            Value::from(30)
        );
    }

    #[test]
    fn test_proceed_with_rejects_bad_args() {
        let class = adder();
        let obj = Object::allocate(&class);
        let adapter = adapter_for(
            &class,
            Arc::new(|jp: &JoinPoint| jp.proceed_with(vec![Value::from("x"), Value::from(1)])),
        );

        assert!(matches!(
            adapter.invoke(&obj, &[Value::from(1), Value::from(1)]),
            Err(InvocationError::IllegalArgument { .. })
        ));
    }

    #[test]
    fn test_advice_may_proceed_many_times() {
        let class = adder();
        let obj = Object::allocate(&class);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let adapter = adapter_for(
            &class,
            Arc::new(move |jp: &JoinPoint| {
                let mut last = Value::Null;
                for _ in 0..3 {
                    counter.fetch_add(1, Ordering::SeqCst);
                    last = jp.proceed()?;
                }
                Ok(last)
            }),
        );

        assert_eq!(
            adapter.invoke(&obj, &[Value::from(1), Value::from(2)]).unwrap(),
            Value::from(3)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_advice_error_propagates() {
        let class = adder();
        let obj = Object::allocate(&class);
        let adapter = adapter_for(
            &class,
            Arc::new(|_: &JoinPoint| Err(InvocationError::thrown("boom"))),
        );

        match adapter.invoke(&obj, &[Value::from(1), Value::from(2)]) {
            Err(InvocationError::Thrown(v)) => assert_eq!(v, Value::from("boom")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_join_point_exposes_context() {
        let class = adder();
        let obj = Object::allocate(&class);
        let expected_id = obj.id();
        let adapter = adapter_for(
            &class,
            Arc::new(move |jp: &JoinPoint| {
                assert_eq!(jp.this().id(), expected_id);
                assert_eq!(jp.signature().name, "add");
                assert_eq!(jp.signature().parameter_names(), vec!["a", "b"]);
                assert_eq!(jp.signature().return_type, TypeInfo::int());
                assert_eq!(jp.args().len(), 2);
                Ok(Value::from(jp.to_short_string()))
            }),
        );

        assert_eq!(
            adapter.invoke(&obj, &[Value::from(1), Value::from(2)]).unwrap(),
            Value::from("JoinPoint(target=add)")
        );
    }
}
