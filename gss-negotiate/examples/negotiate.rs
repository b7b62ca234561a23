/*
Produce the first SPNEGO token for an HTTP Negotiate exchange using the
system GSS-API library. In order to run this example you need a working
kerberos environment, more specifically,

* a valid krb5.conf
* a KDC for your realm that knows an HTTP/<host> service principal
* a valid TGT, e.g. klist should print at least something like,

Ticket cache: FILE:/tmp/krb5cc_1000_Ooxj5E
Default principal: user@EXAMPLE.COM

Valid starting       Expires              Service principal
03/17/2020 18:10:05  03/18/2020 04:10:05  krbtgt/EXAMPLE.COM@EXAMPLE.COM

if it doesn't then run kinit first.

cargo run -p gss-negotiate --features gssapi --example negotiate web.example.com
status: GSS_S_CONTINUE_NEEDED
Authorization: Negotiate YIIHLwYGKwYBBQUCoIIHIzCCBx+gMDAuBgkqhk...

Pass `--bind` to connect to host:port first and bind the token to that
connection. Pass a second argument to feed the server's challenge to a
fresh exchange, which is mostly useful to see how a bogus challenge is
reported. With MIT Kerberos, KRB5_TRACE=/dev/stderr shows what the
library is doing.
*/

use gss_negotiate::{
    gss::{SystemGss, SystemTicketCache},
    HostSpec, NegotiateEngine, RawTransport, TokenRequest,
};
use std::{env::args, net::TcpStream, sync::Arc};

#[cfg(unix)]
fn transport(stream: &TcpStream) -> RawTransport<'_> {
    use std::os::fd::AsFd;
    stream.as_fd()
}

#[cfg(windows)]
fn transport(stream: &TcpStream) -> RawTransport<'_> {
    use std::os::windows::io::AsSocket;
    stream.as_socket()
}

fn run(host: &str, challenge: &str, bind: bool) -> Result<(), Box<dyn std::error::Error>> {
    let spec = host.parse::<HostSpec>()?;
    let mut engine = NegotiateEngine::new(Arc::new(SystemTicketCache), Arc::new(SystemGss));
    let stream = if bind {
        Some(TcpStream::connect((spec.host(), spec.port()))?)
    } else {
        None
    };
    let mut request = TokenRequest::host(challenge, host, false);
    if let Some(stream) = &stream {
        request = request.with_transport(transport(stream));
    }
    let token = engine.generate(request)?;
    println!("status: {}", engine.status());
    match token {
        Some(token) => println!("Authorization: {}", token.authorization_header()),
        None if engine.status().suggests_ticket_refresh() => {
            println!("no usable credentials, run kinit and try again")
        }
        None => println!("no token produced"),
    }
    Ok(())
}

fn main() {
    let mut bind = false;
    let args = args()
        .filter(|a| {
            let flag = a == "--bind";
            bind |= flag;
            !flag
        })
        .collect::<Vec<_>>();
    if args.len() < 2 || args.len() > 3 {
        println!("usage: {}: [--bind] <host[:port]> [challenge]", args[0]);
    } else {
        let challenge = args.get(2).map(String::as_str).unwrap_or("");
        if let Err(e) = run(&args[1], challenge, bind) {
            println!("{}", e)
        }
    }
}
