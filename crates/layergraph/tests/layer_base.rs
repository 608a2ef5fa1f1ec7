
use std::sync::Arc;

use graph_support::{backend, variable, BareLayer, ProbeLayer, RecordingLayer};
use layergraph::init::Constant;
use layergraph::{
    DType, HostTensor, InputValue, Layer, LayerError, Node, OutputOptions, Overrides, Param,
    ParamSpec, ParamTags, Shape, TagFilter, REGULARIZABLE, TRAINABLE,
};
use layergraph_backend_ref::{Bindings, RefBackend, RefExpr};

fn probe_on_recording() -> (Arc<RefBackend>, Arc<RecordingLayer>, Arc<ProbeLayer>) {
    let backend = backend();
    let upstream = RecordingLayer::new(&backend, [10usize, 20]);
    let probe = Arc::new(ProbeLayer::new(&backend, Node::single(Arc::clone(&upstream)), None));
    (backend, upstream, probe)
}

#[test]
fn input_shape_is_taken_from_upstream() {
    let (_, _, probe) = probe_on_recording();
    assert_eq!(probe.base().input_shape(), &Shape::from([10usize, 20]));
    assert_eq!(probe.output_shape().unwrap(), Shape::from([10usize, 20]));
    assert!(probe.base().input_layer().is_some());
}

#[test]
fn output_feeds_upstream_expression_through_expr_for() {
    let (_, upstream, probe) = probe_on_recording();
    let output = probe.output(&Overrides::new(), &OutputOptions::new()).unwrap();

    assert_eq!(&output, probe.result());
    let seen = probe.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(&seen[0].0, upstream.expr());
    assert_eq!(upstream.calls(), vec![OutputOptions::new()]);
}

#[test]
fn output_passes_overrides_and_options_upstream() {
    let (backend, upstream, probe) = probe_on_recording();
    let unrelated = Node::single(RecordingLayer::new(&backend, [1usize]));
    let inputs = Overrides::new().with(&unrelated, InputValue::Expr(variable(&backend, 1)));
    let options = OutputOptions::new()
        .with("deterministic", true)
        .with("kwarg", "value");

    let output = probe.output(&inputs, &options).unwrap();

    assert_eq!(&output, probe.result());
    assert_eq!(upstream.calls(), vec![options.clone()]);
    assert_eq!(probe.seen()[0].1, options);
}

#[test]
fn mapped_layer_short_circuits_resolution() {
    let (backend, upstream, probe) = probe_on_recording();
    let node = Node::single(Arc::clone(&probe));
    let replacement = variable(&backend, 2);

    let output = node
        .output(
            &Overrides::new().with(&node, InputValue::Expr(replacement.clone())),
            &OutputOptions::new(),
        )
        .unwrap();

    assert_eq!(output, replacement);
    assert!(upstream.calls().is_empty());
    assert!(probe.seen().is_empty());
}

#[test]
fn mapping_to_an_array_yields_a_constant() {
    let (_, upstream, probe) = probe_on_recording();
    let node = Node::single(Arc::clone(&probe));
    let array = HostTensor::from_f32([2usize, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();

    let output = node
        .output(
            &Overrides::new().with(&node, array.clone()),
            &OutputOptions::new(),
        )
        .unwrap();

    assert!(matches!(output, RefExpr::Constant(_)));
    let value = output.eval(&Bindings::new()).unwrap();
    assert!(value.allclose(&array, 1e-6));
    assert!(upstream.calls().is_empty());
}

#[test]
fn shape_declared_layer_has_no_upstream() {
    let backend = backend();
    let layer = BareLayer::new(&backend, Shape::from([Some(3usize), None]), None);
    assert!(layer.base().input_layer().is_none());
    assert_eq!(layer.output_shape().unwrap(), Shape::from([Some(3usize), None]));
    assert!(Node::single(Arc::new(layer)).upstream().is_empty());
}

#[test]
fn unmapped_shape_declared_layer_is_unconnected() {
    let backend = backend();
    let node = Node::single(Arc::new(BareLayer::new(
        &backend,
        Shape::from([3usize, 2]),
        None,
    )));
    let other = Node::single(RecordingLayer::new(&backend, [3usize, 2]));
    let options = OutputOptions::new();

    let err = node.output(&Overrides::new(), &options).unwrap_err();
    assert!(matches!(err, LayerError::UnconnectedNode { .. }));

    // A network-wide input only feeds input layers.
    let err = node
        .output(
            &Overrides::for_inputs(InputValue::Expr(variable(&backend, 2))),
            &options,
        )
        .unwrap_err();
    assert!(matches!(err, LayerError::UnconnectedNode { .. }));

    let err = node
        .output(
            &Overrides::new().with(&other, InputValue::Expr(variable(&backend, 2))),
            &options,
        )
        .unwrap_err();
    assert!(matches!(err, LayerError::UnconnectedNode { .. }));

    let replacement = variable(&backend, 2);
    let output = node
        .output(
            &Overrides::new().with(&node, InputValue::Expr(replacement.clone())),
            &options,
        )
        .unwrap();
    assert_eq!(output, replacement);
}

#[test]
fn default_expr_for_is_not_implemented() {
    let backend = backend();
    let upstream = Node::single(RecordingLayer::new(&backend, [4usize, 2]));
    let layer = BareLayer::new(&backend, &upstream, Some("bare"));

    let err = layer
        .output(&Overrides::new(), &OutputOptions::new())
        .unwrap_err();
    match err {
        LayerError::NotImplemented { layer, method } => {
            assert!(layer.contains("bare"));
            assert_eq!(method, "expr_for");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn named_layer_keeps_its_name() {
    let backend = backend();
    let layer = BareLayer::new(&backend, Shape::from([1usize]), Some("foo"));
    assert_eq!(layer.base().name(), Some("foo"));
    assert!(layer.base().label().contains("foo"));

    let node = Node::single(Arc::new(layer));
    assert_eq!(node.name(), Some("foo"));
}

fn literal(shape: [usize; 2]) -> HostTensor {
    HostTensor::from_fn(shape, DType::F64, |i| i as f64 * 0.5)
}

#[test]
fn get_params_filters_by_tag() {
    let backend = backend();
    let mut layer = BareLayer::new(&backend, Shape::from([1usize]), None);
    let a = layer
        .base_mut()
        .add_param(literal([20, 50]), &[20, 50], None, ParamTags::new())
        .unwrap();
    let b = layer
        .base_mut()
        .add_param(
            literal([30, 20]),
            &[30, 20],
            None,
            ParamTags::from([("tag1", true)]),
        )
        .unwrap();
    let c = layer
        .base_mut()
        .add_param(
            literal([40, 10]),
            &[40, 10],
            None,
            ParamTags::from([("tag2", true)]),
        )
        .unwrap();

    assert_eq!(layer.get_params(&TagFilter::new()), vec![a.clone(), b.clone(), c.clone()]);
    assert_eq!(layer.get_params(&TagFilter::only("tag1")), vec![b.clone()]);
    assert_eq!(layer.get_params(&TagFilter::exclude("tag1")), vec![a.clone(), c.clone()]);
    assert_eq!(layer.get_params(&TagFilter::only("tag2")), vec![c.clone()]);
    assert_eq!(layer.get_params(&TagFilter::exclude("tag2")), vec![a.clone(), b.clone()]);
    assert_eq!(
        layer.get_params(&TagFilter::from([("tag1", true), ("tag2", true)])),
        Vec::<Param<RefBackend>>::new()
    );
    assert_eq!(
        layer.get_params(&TagFilter::only(TRAINABLE)),
        vec![a, b, c]
    );
}

#[test]
fn add_param_applies_default_tags_and_names() {
    let backend = backend();
    let mut layer = BareLayer::new(&backend, Shape::from([1usize]), None);
    let a = layer
        .base_mut()
        .add_param(literal([2, 3]), &[2, 3], Some("A"), ParamTags::new())
        .unwrap();
    let frozen = layer
        .base_mut()
        .add_param(
            literal([2, 3]),
            &[2, 3],
            None,
            ParamTags::new().trainable(false),
        )
        .unwrap();

    assert_eq!(a.name().as_deref(), Some("A"));
    assert_eq!(frozen.name(), None);
    let tags = layer.base().params().tags(&a).unwrap();
    assert!(tags.contains(TRAINABLE) && tags.contains(REGULARIZABLE));
    assert_eq!(layer.get_params(&TagFilter::only(TRAINABLE)), vec![a.clone()]);
    assert_eq!(
        layer.get_params(&TagFilter::only(REGULARIZABLE)),
        vec![a, frozen]
    );

    let mut named = BareLayer::new(&backend, Shape::from([1usize]), Some("layer_name"));
    let param = named
        .base_mut()
        .add_param(literal([2, 3]), &[2, 3], Some("A"), ParamTags::new())
        .unwrap();
    assert_eq!(param.name().as_deref(), Some("layer_name.A"));
}

#[test]
fn add_param_reuses_shared_handles() {
    let backend = backend();
    let shared = Param::shared(&backend, literal([4, 3]), Some("shared")).unwrap();
    let mut first = BareLayer::new(&backend, Shape::from([1usize]), None);
    let mut second = BareLayer::new(&backend, Shape::from([1usize]), None);

    let p1 = first
        .base_mut()
        .add_param(&shared, &[4, 3], Some("W"), ParamTags::new())
        .unwrap();
    let p2 = second
        .base_mut()
        .add_param(shared.clone(), &[4, 3], None, ParamTags::new())
        .unwrap();

    assert_eq!(p1, shared);
    assert_eq!(p2, shared);
    assert_eq!(p1.name().as_deref(), Some("shared"));
}

#[test]
fn add_param_rejects_mismatched_specs() {
    let backend = backend();
    let mut layer = BareLayer::new(&backend, Shape::from([1usize]), None);

    let err = layer
        .base_mut()
        .add_param(literal([3, 2]), &[2, 3], None, ParamTags::new())
        .unwrap_err();
    assert!(matches!(
        err,
        LayerError::ShapeMismatch { ref expected, ref found } if expected == &[2, 3] && found == &[3, 2]
    ));

    let shared = Param::shared(&backend, literal([4, 3]), None).unwrap();
    let err = layer
        .base_mut()
        .add_param(shared, &[12], None, ParamTags::new())
        .unwrap_err();
    assert!(matches!(
        err,
        LayerError::DimensionMismatch { expected: 1, found: 2 }
    ));

    let failing = ParamSpec::<RefBackend>::initializer(
        |_shape: &[usize]| -> anyhow::Result<HostTensor> { anyhow::bail!("no values") },
    );
    let err = layer
        .base_mut()
        .add_param(failing, &[2, 2], None, ParamTags::new())
        .unwrap_err();
    assert!(matches!(err, LayerError::InvalidInitializer(_)));

    assert!(layer.base().params().is_empty());
}

#[test]
fn non_array_values_are_not_param_specs() {
    let backend = backend();
    let scalar = ParamSpec::<RefBackend>::try_from(InputValue::Scalar(1.0));
    assert!(matches!(scalar, Err(LayerError::UnsupportedSpec(_))));

    let expr = ParamSpec::<RefBackend>::try_from(InputValue::Expr(variable(&backend, 2)));
    assert!(matches!(expr, Err(LayerError::UnsupportedSpec(_))));

    let array = ParamSpec::<RefBackend>::try_from(InputValue::Array(literal([2, 2])));
    assert!(matches!(array, Ok(ParamSpec::Literal(_))));
}

#[test]
fn array_sourced_params_use_the_float_dtype() {
    let backend = backend();
    let mut layer = BareLayer::new(&backend, Shape::from([1usize]), None);

    let from_literal = layer
        .base_mut()
        .add_param(literal([2, 2]), &[2, 2], None, ParamTags::new())
        .unwrap();
    assert_eq!(from_literal.get_value().unwrap().dtype(), DType::F32);

    let from_init = layer
        .base_mut()
        .add_param(
            ParamSpec::<RefBackend>::initializer(Constant::new(1.5)),
            &[3],
            None,
            ParamTags::new(),
        )
        .unwrap();
    let value = from_init.get_value().unwrap();
    assert_eq!(value.dtype(), DType::F32);
    assert_eq!(value.as_f32(), Some(&[1.5f32, 1.5, 1.5][..]));
}
