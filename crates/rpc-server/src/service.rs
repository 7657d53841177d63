use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rpc_protocol::{CodecError, Header, NegotiatedReader, NegotiatedWriter};
use serde::Serialize;
use serde::de::DeserializeOwned;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type ErasedArgs = Box<dyn Any + Send>;
type ErasedReply = Box<dyn Any + Send>;

type DecodeArgsFn =
    Box<dyn for<'a> Fn(&'a mut NegotiatedReader) -> BoxFuture<'a, Result<ErasedArgs, CodecError>> + Send + Sync>;
type InvokeFn = Box<dyn Fn(ErasedArgs) -> BoxFuture<'static, Result<ErasedReply, String>> + Send + Sync>;
type EncodeReplyFn = Box<
    dyn for<'a> Fn(
            Result<ErasedReply, String>,
            &'a mut NegotiatedWriter,
            Header,
        ) -> BoxFuture<'a, Result<(), CodecError>>
        + Send
        + Sync,
>;

/// The Rust stand-in for the source's reflection-built method dispatch (see
/// `DESIGN.md`): a typed decode/invoke/encode triple captured once at
/// registration time instead of rebuilt per call via `reflect.Type`.
///
/// A method is eligible for registration (mirroring spec.md's invariant)
/// simply by having a handler of the right shape — there is no separate
/// eligibility check, because the type system enforces signature shape at
/// `Service::method` call sites.
pub struct MethodDescriptor {
    name: String,
    decode_args: DecodeArgsFn,
    invoke: InvokeFn,
    encode_reply: EncodeReplyFn,
}

impl MethodDescriptor {
    /// `handler` receives decoded args and returns the reply or an error
    /// message — the Rust equivalent of the source's
    /// `(receiver, args, reply_pointer) -> error` signature, with the
    /// receiver already bound into the closure by the caller.
    pub fn new<A, R, F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Default + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, String>> + Send + 'static,
    {
        let handler = Arc::new(handler);

        let decode_args: DecodeArgsFn = Box::new(|reader: &mut NegotiatedReader| {
            Box::pin(async move {
                let args: A = reader.read_body().await?;
                Ok(Box::new(args) as ErasedArgs)
            })
        });

        let invoke_handler = handler.clone();
        let invoke: InvokeFn = Box::new(move |args: ErasedArgs| {
            let handler = invoke_handler.clone();
            Box::pin(async move {
                let args = *args
                    .downcast::<A>()
                    .expect("decode_args always produces the type invoke expects");
                handler(args).await.map(|reply| Box::new(reply) as ErasedReply)
            })
        });

        let encode_reply: EncodeReplyFn = Box::new(
            move |outcome: Result<ErasedReply, String>, writer: &mut NegotiatedWriter, mut header: Header| {
                Box::pin(async move {
                    match outcome {
                        Ok(reply) => {
                            let reply = reply
                                .downcast::<R>()
                                .expect("invoke always produces the type encode_reply expects");
                            writer.write(&header, &*reply).await
                        }
                        Err(err) => {
                            header.err = err;
                            let zero = R::default();
                            writer.write(&header, &zero).await
                        }
                    }
                })
            },
        );

        MethodDescriptor {
            name: name.into(),
            decode_args,
            invoke,
            encode_reply,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn decode_args(&self, reader: &mut NegotiatedReader) -> Result<ErasedArgs, CodecError> {
        (self.decode_args)(reader).await
    }

    pub async fn invoke(&self, args: ErasedArgs) -> Result<ErasedReply, String> {
        (self.invoke)(args).await
    }

    pub async fn encode_reply(
        &self,
        outcome: Result<ErasedReply, String>,
        writer: &mut NegotiatedWriter,
        header: Header,
    ) -> Result<(), CodecError> {
        (self.encode_reply)(outcome, writer, header).await
    }
}

/// A named collection of method descriptors, registered on a [`crate::Server`]
/// under a service name (spec.md §3's `Service`).
pub struct Service {
    name: String,
    methods: HashMap<String, Arc<MethodDescriptor>>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Service {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    #[must_use]
    pub fn method<A, R, F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Default + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, String>> + Send + 'static,
    {
        let name = name.into();
        self.methods
            .insert(name.clone(), Arc::new(MethodDescriptor::new(name, handler)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method_named(&self, name: &str) -> Option<Arc<MethodDescriptor>> {
        self.methods.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_protocol::{BoxedStream, CodecKind, CodecRegistry};
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Args {
        a: i64,
        b: i64,
    }

    fn negotiated_pair() -> ((NegotiatedReader, NegotiatedWriter), (NegotiatedReader, NegotiatedWriter)) {
        let (a, b) = tokio::io::duplex(4096);
        let registry = CodecRegistry::with_defaults();
        let a: BoxedStream = Box::new(a);
        let b: BoxedStream = Box::new(b);
        (
            registry.build(CodecKind::Json.name(), Vec::new(), a).unwrap(),
            registry.build(CodecKind::Json.name(), Vec::new(), b).unwrap(),
        )
    }

    #[tokio::test]
    async fn successful_call_decodes_invokes_and_encodes_the_reply() {
        let method = MethodDescriptor::new("Add", |args: Args| async move { Ok::<i64, String>(args.a + args.b) });

        let ((mut service_reader, mut service_writer), (mut probe_reader, mut probe_writer)) = negotiated_pair();

        let header = Header::request("Adder", "Add", 1);
        probe_writer.write(&header, &Args { a: 3, b: 5 }).await.unwrap();

        let args = method.decode_args(&mut service_reader).await.unwrap();
        let outcome = method.invoke(args).await;
        method.encode_reply(outcome, &mut service_writer, header).await.unwrap();

        let reply_header = probe_reader.read_header().await.unwrap();
        assert!(reply_header.is_ok());
        let reply: i64 = probe_reader.read_body().await.unwrap();
        assert_eq!(reply, 8);
    }

    #[tokio::test]
    async fn failed_invocation_encodes_error_header_and_zero_reply() {
        let method = MethodDescriptor::new("GetErr", |_args: Args| async move {
            Err::<i64, String>("a unexpected error".to_owned())
        });

        let ((mut service_reader, mut service_writer), (mut probe_reader, mut probe_writer)) = negotiated_pair();

        let header = Header::request("ErrService", "GetErr", 7);
        probe_writer.write(&header, &Args { a: 0, b: 0 }).await.unwrap();

        let args = method.decode_args(&mut service_reader).await.unwrap();
        let outcome = method.invoke(args).await;
        method.encode_reply(outcome, &mut service_writer, header).await.unwrap();

        let reply_header = probe_reader.read_header().await.unwrap();
        assert!(!reply_header.is_ok());
        assert_eq!(reply_header.err, "a unexpected error");
        let reply: i64 = probe_reader.read_body().await.unwrap();
        assert_eq!(reply, 0);
    }

    #[test]
    fn service_looks_up_registered_methods_by_name_only() {
        let service = Service::new("Adder")
            .method("Add", |args: Args| async move { Ok::<i64, String>(args.a + args.b) });
        assert!(service.method_named("Add").is_some());
        assert!(service.method_named("DoComplex").is_none());
    }
}
