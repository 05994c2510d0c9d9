mod reopen;
