use criterion::{black_box, criterion_group, criterion_main, Criterion};

use contextual_di::{
    Container, ContextResult, ContextualId, CreationalContext, InterceptionHandler,
    InterceptionModel, InterceptionType, Interceptor, InvocationContext, InvocationStack,
    Invokable, MethodDescriptor, ParamType, ParamValue, ScopeKind,
};
use std::sync::Arc;

struct Adder;

impl Invokable for Adder {
    fn invoke(&self, _method: &MethodDescriptor, args: &[ParamValue]) -> ContextResult<ParamValue> {
        match args {
            [ParamValue::Int(a), ParamValue::Int(b)] => Ok(ParamValue::Int(a + b)),
            _ => Ok(ParamValue::Null),
        }
    }
}

struct PassThrough;

impl Interceptor for PassThrough {
    fn intercepts(&self, ty: InterceptionType) -> bool {
        ty == InterceptionType::AroundInvoke
    }

    fn intercept(
        &self,
        _ty: InterceptionType,
        ctx: &InvocationContext,
    ) -> ContextResult<ParamValue> {
        ctx.proceed()
    }
}

fn handler_with(interceptors: usize) -> InterceptionHandler {
    let mut builder = Container::builder();
    let mut ids = Vec::new();
    for index in 0..interceptors {
        let id = ContextualId::new(format!("ix.pass.{index}").as_str());
        builder.interceptor(id.clone(), |_, _| {
            Ok(Arc::new(PassThrough) as Arc<dyn Interceptor>)
        });
        ids.push(id);
    }
    builder.component::<u8, _>("comp.adder", ScopeKind::Application, |_, _| Ok(Arc::new(0u8)));
    let model = if ids.is_empty() {
        InterceptionModel::empty()
    } else {
        InterceptionModel::builder()
            .intercept_all(InterceptionType::AroundInvoke, ids)
            .build()
    };
    builder.interception_model("comp.adder", model);
    let container = builder.build();

    let scope = container.resolution_scope();
    let resolution = scope.resolution();
    let creational = CreationalContext::root(ContextualId::new("comp.adder"));
    container
        .handler_for(
            &ContextualId::new("comp.adder"),
            Arc::new(Adder) as Arc<dyn Invokable>,
            &creational,
            &resolution,
        )
        .unwrap()
}

fn bench_dispatch(c: &mut Criterion) {
    let method = MethodDescriptor::new("add", vec![ParamType::Int, ParamType::Int]);

    let direct = handler_with(0);
    let stack = InvocationStack::new();
    c.bench_function("dispatch_no_interceptors", |b| {
        b.iter(|| {
            direct
                .invoke(
                    &stack,
                    black_box(&method),
                    vec![ParamValue::Int(2), ParamValue::Int(3)],
                )
                .unwrap()
        })
    });

    let chained = handler_with(3);
    c.bench_function("dispatch_three_interceptors", |b| {
        b.iter(|| {
            chained
                .invoke(
                    &stack,
                    black_box(&method),
                    vec![ParamValue::Int(2), ParamValue::Int(3)],
                )
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_dispatch);
criterion_main!(benches);
