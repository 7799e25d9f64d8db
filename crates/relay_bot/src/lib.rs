//! Console messaging gateway for the chat relay.

pub mod dispatcher;
pub mod gateway;
pub mod logging;

pub use dispatcher::{parse_command, Command, DispatchSettings, Dispatcher, ExchangeHandler};
pub use gateway::{
    run, ChannelContext, ConsoleGateway, Gateway, GatewayError, InboundMessage, RunOutcome,
};
